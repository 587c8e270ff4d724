// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Database schema for warden identities.
//!
//! One table per logical keyspace. UserByID/UserByName collapse into the
//! `Users` table with a unique name index; GroupByID/GroupByName/
//! GroupByUGID collapse into `Groups`; the two membership pivots share
//! the `Memberships` table with an index per direction.

/// Identity schema SQL (Users, Groups, Memberships, LocalGroups)
pub const SCHEMA_SQL: &str = r#"
create table if not exists Users (
    uid       integer primary key not null,
    name      text unique not null,
    gid       integer not null,
    gecos     text not null default '',
    dir       text not null default '',
    shell     text not null default '',
    brokerId  text not null default '',
    disabled  integer not null default 0,
    lastLogin integer not null
);

create table if not exists Groups (
    gid  integer primary key not null,
    name text unique not null,
    ugid text unique not null
);

create table if not exists Memberships (
    uid integer not null,
    gid integer not null,
    primary key (uid, gid),
    foreign key (uid) references Users(uid) on delete cascade,
    foreign key (gid) references Groups(gid) on delete cascade
);

create index if not exists IndexMembershipUid on Memberships(uid);
create index if not exists IndexMembershipGid on Memberships(gid);

create table if not exists LocalGroups (
    uid  integer not null,
    name text not null,
    primary key (uid, name),
    foreign key (uid) references Users(uid) on delete cascade
);
"#;

/// Schema version, stored in `pragma user_version`.
pub const SCHEMA_VERSION: i32 = 1;
