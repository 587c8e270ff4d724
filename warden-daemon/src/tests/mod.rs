// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

mod end_to_end;
mod test_env;
