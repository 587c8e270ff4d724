// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Smoke tests for warden-store.
//!
//! These tests verify the schema and the upsert/delete/expiry operations
//! using an in-memory database.

use std::collections::HashSet;

use warden_store::{GroupRecord, UserDb, UserRecord};

fn make_user(name: &str, uid: u32) -> UserRecord {
    UserRecord {
        name: name.to_owned(),
        uid,
        gid: uid,
        gecos: String::new(),
        dir: format!("/home/{name}"),
        shell: "/bin/sh".to_owned(),
        broker_id: String::new(),
        disabled: false,
        last_login: 1_700_000_000,
    }
}

fn with_private_group(user: &UserRecord, extra: &[GroupRecord]) -> Vec<GroupRecord> {
    let mut groups = vec![GroupRecord::private_for(user)];
    groups.extend_from_slice(extra);
    groups
}

/// Verify user registration and query roundtrip.
#[test]
fn test_user_roundtrip() {
    let mut db = UserDb::open_memory().unwrap();

    let alice = make_user("alice", 10000);
    db.upsert_user(&alice, &with_private_group(&alice, &[]), &[])
        .unwrap();

    let by_name = db.user_by_name("alice").unwrap();
    let by_id = db.user_by_id(10000).unwrap();
    assert_eq!(by_name, by_id);
    assert_eq!(by_name.uid, 10000);
    assert_eq!(by_name.gid, 10000);

    // The private group exists under all three keys.
    assert_eq!(db.group_by_id(10000).unwrap().name, "alice");
    assert_eq!(db.group_by_name("alice").unwrap().gid, 10000);
    assert_eq!(db.group_by_ugid("alice").unwrap().gid, 10000);
    assert_eq!(db.members_of(10000).unwrap(), vec!["alice"]);
}

/// A second user may not claim an existing name or UID.
#[test]
fn test_upsert_conflicts() {
    let mut db = UserDb::open_memory().unwrap();

    let alice = make_user("alice", 10000);
    db.upsert_user(&alice, &with_private_group(&alice, &[]), &[])
        .unwrap();

    let name_thief = make_user("alice", 10001);
    let err = db
        .upsert_user(&name_thief, &with_private_group(&name_thief, &[]), &[])
        .unwrap_err();
    assert!(matches!(err, warden_store::Error::Conflict(_)));

    let uid_thief = make_user("mallory", 10000);
    let err = db
        .upsert_user(&uid_thief, &with_private_group(&uid_thief, &[]), &[])
        .unwrap_err();
    assert!(matches!(err, warden_store::Error::Conflict(_)));
}

/// Membership reconciliation removes stale groups and deletes empty ones.
#[test]
fn test_membership_reconciliation() {
    let mut db = UserDb::open_memory().unwrap();

    let alice = make_user("alice", 10000);
    let cloud = GroupRecord {
        name: "cloud-users".into(),
        gid: 10005,
        ugid: "grp-cloud".into(),
    };
    db.upsert_user(&alice, &with_private_group(&alice, &[cloud.clone()]), &[])
        .unwrap();
    assert_eq!(db.members_of(10005).unwrap(), vec!["alice"]);

    // Re-upsert without the cloud group: membership goes away and the
    // now-empty group is dropped.
    db.upsert_user(&alice, &with_private_group(&alice, &[]), &[])
        .unwrap();
    assert!(db.group_by_id(10005).unwrap_err().is_not_found());
}

/// A group rename keyed by UGID keeps the GID.
#[test]
fn test_group_rename_by_ugid() {
    let mut db = UserDb::open_memory().unwrap();

    let alice = make_user("alice", 10000);
    let old = GroupRecord {
        name: "devs".into(),
        gid: 10005,
        ugid: "grp-1".into(),
    };
    db.upsert_user(&alice, &with_private_group(&alice, &[old]), &[])
        .unwrap();

    let renamed = GroupRecord {
        name: "engineers".into(),
        gid: 10005,
        ugid: "grp-1".into(),
    };
    db.upsert_user(&alice, &with_private_group(&alice, &[renamed]), &[])
        .unwrap();

    assert_eq!(db.group_by_ugid("grp-1").unwrap().name, "engineers");
    assert_eq!(db.group_by_name("engineers").unwrap().gid, 10005);
    assert!(db.group_by_name("devs").unwrap_err().is_not_found());
}

/// Deleting a user removes the private group and prunes empty groups, but
/// keeps groups that still have members.
#[test]
fn test_delete_user_cascade() {
    let mut db = UserDb::open_memory().unwrap();

    let shared = GroupRecord {
        name: "cloud-users".into(),
        gid: 10005,
        ugid: "grp-cloud".into(),
    };
    let alice = make_user("alice", 10000);
    let bob = make_user("bob", 10001);
    db.upsert_user(&alice, &with_private_group(&alice, &[shared.clone()]), &[])
        .unwrap();
    db.upsert_user(&bob, &with_private_group(&bob, &[shared.clone()]), &[])
        .unwrap();

    db.delete_user(10000).unwrap();

    assert!(db.user_by_name("alice").unwrap_err().is_not_found());
    assert!(db.group_by_name("alice").unwrap_err().is_not_found());
    // bob keeps the shared group alive
    assert_eq!(db.members_of(10005).unwrap(), vec!["bob"]);

    db.delete_user(10001).unwrap();
    assert!(db.group_by_id(10005).unwrap_err().is_not_found());
}

/// Local-group lists are stored per user and replaced wholesale.
#[test]
fn test_local_groups_roundtrip() {
    let mut db = UserDb::open_memory().unwrap();

    let alice = make_user("alice", 10000);
    db.upsert_user(
        &alice,
        &with_private_group(&alice, &[]),
        &["sudo".into(), "adm".into()],
    )
    .unwrap();
    assert_eq!(db.local_groups_of_user(10000).unwrap(), vec!["adm", "sudo"]);

    db.upsert_user(&alice, &with_private_group(&alice, &[]), &["sudo".into()])
        .unwrap();
    assert_eq!(db.local_groups_of_user(10000).unwrap(), vec!["sudo"]);
}

/// Expired users are cleaned unless they still own processes.
#[test]
fn test_clean_expired_users() {
    let mut db = UserDb::open_memory().unwrap();

    let mut stale = make_user("stale", 10000);
    stale.last_login = 1_000;
    let mut busy = make_user("busy", 10001);
    busy.last_login = 1_000;
    let fresh = make_user("fresh", 10002);

    for user in [&stale, &busy, &fresh] {
        db.upsert_user(user, &with_private_group(user, &[]), &[])
            .unwrap();
    }

    let active = HashSet::from(["busy".to_owned()]);
    let cleaned = db.clean_expired_users(&active, 2_000).unwrap();
    assert_eq!(cleaned, vec!["stale"]);

    assert!(db.user_by_name("stale").unwrap_err().is_not_found());
    assert!(db.user_by_name("busy").is_ok());
    assert!(db.user_by_name("fresh").is_ok());
}

/// Broker bindings and account flags survive the update cycle.
#[test]
fn test_broker_binding_and_flags() {
    let mut db = UserDb::open_memory().unwrap();

    let alice = make_user("alice", 10000);
    db.upsert_user(&alice, &with_private_group(&alice, &[]), &[])
        .unwrap();

    db.set_broker_for_user(10000, "sample").unwrap();
    assert_eq!(db.broker_for_user("alice").unwrap(), "sample");

    db.set_user_disabled("alice", true).unwrap();
    assert!(db.user_by_name("alice").unwrap().disabled);

    db.set_last_login("alice", 1_800_000_000).unwrap();
    assert_eq!(db.user_by_name("alice").unwrap().last_login, 1_800_000_000);

    let err = db.set_broker_for_user(99999, "sample").unwrap_err();
    assert!(err.is_not_found());
}

/// Group listings resolve member names and spot dangling memberships.
#[test]
fn test_group_listing() {
    let mut db = UserDb::open_memory().unwrap();

    let shared = GroupRecord {
        name: "cloud-users".into(),
        gid: 10005,
        ugid: "grp-cloud".into(),
    };
    let alice = make_user("alice", 10000);
    let bob = make_user("bob", 10001);
    db.upsert_user(&alice, &with_private_group(&alice, &[shared.clone()]), &[])
        .unwrap();
    db.upsert_user(&bob, &with_private_group(&bob, &[shared]), &[])
        .unwrap();

    let groups = db.all_groups_with_members().unwrap();
    assert_eq!(groups.len(), 3);
    let cloud = groups.iter().find(|g| g.group.gid == 10005).unwrap();
    assert_eq!(cloud.users, vec!["alice", "bob"]);
}
