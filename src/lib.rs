// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Run-length encoded column segments with filter pushdown and MVCC updates.

#![feature(error_generic_member_access)]
#![deny(unused_must_use)]

pub mod array;
pub mod storage;
pub mod types;
