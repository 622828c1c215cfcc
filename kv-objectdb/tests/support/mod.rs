#![allow(dead_code)]

use kv_objectdb::{Embedded, Entity, Id, Key, composite_id};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 关注关系，key 由两端 id 组合而成，保证同一对不会重复
#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[objectdb(id_with = "id")]
pub struct Follower {
    pub user_id: i64,
    pub follower_id: i64,
}

impl Follower {
    pub fn new(user_id: i64, follower_id: i64) -> Self {
        Self {
            user_id,
            follower_id,
        }
    }

    pub fn id(&self) -> Id {
        composite_id(&[self.user_id, self.follower_id])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct FollowersCursor {
    pub id: i64,
    pub cursor: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct User {
    pub id: i64,
    pub depth_goal: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct Friend {
    #[objectdb(parent)]
    pub parent: Option<Key>,
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Entity)]
pub struct FollowersTracker {
    pub id: i64,
    pub should_retrieve_followers: bool,
    pub should_retrieve_level2_followers: bool,
    pub followers_retrieved: bool,
    pub level2_followers_retrieved: bool,
    pub followers_cursor: i64,
}

impl Default for FollowersTracker {
    fn default() -> Self {
        Self {
            id: 0,
            should_retrieve_followers: false,
            should_retrieve_level2_followers: false,
            followers_retrieved: false,
            level2_followers_retrieved: false,
            // Twitter 分页的起始游标
            followers_cursor: -1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct FollowersGoal {
    pub id: String,
    pub depth_goal: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Embedded)]
pub struct Location {
    pub city: String,
    pub utc_offset: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[objectdb(kind = "UserDetail")]
pub struct Detail {
    pub id: i64,
    #[objectdb(rename = "screenName")]
    pub screen_name: String,
    pub followers_count: i64,
    pub ratio: f64,
    pub location: Option<Location>,
    pub goal: Option<Key>,
}
