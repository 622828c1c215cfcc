//! 需要真实 TiKV 集群，每个测试会清空数据：`OBJECTDB_PD_ENDPOINTS=127.0.0.1:2379 cargo test --test tikv -- --ignored --test-threads=1`

mod support;

use futures::TryStreamExt;
use kv_objectdb::{Constraints, ObjectDb, TikvConfig, tikv::TikvStore};
use support::*;

async fn connect() -> Option<ObjectDb<TikvStore>> {
    init_logger();
    let config = TikvConfig::from_env()?;
    let store = TikvStore::connect(&config).await.unwrap();
    store.drop_all().await.unwrap();
    Some(ObjectDb::new(store))
}

#[tokio::test]
#[ignore]
async fn test_tikv_save_query_delete() {
    let Some(db) = connect().await else {
        return;
    };
    db.save_all(&[Follower::new(3, 4), Follower::new(5, 6)])
        .await
        .unwrap();

    let found = db
        .find_one_where::<Follower>(&Constraints::new().with("user_id", 3i64))
        .await
        .unwrap();
    assert_eq!(found, Some(Follower::new(3, 4)));

    db.delete(&Follower::new(3, 4)).await.unwrap();
    assert_eq!(db.find::<Follower>(10).await.unwrap(), vec![Follower::new(5, 6)]);
}

#[tokio::test]
#[ignore]
async fn test_tikv_descendants_in_id_order() {
    let Some(db) = connect().await else {
        return;
    };
    let user = User { id: 1, depth_goal: 2 };
    let other = User { id: 2, depth_goal: 2 };
    db.save_all(&[user.clone(), other.clone()]).await.unwrap();

    let key = db.mapper().object_key(&user).unwrap();
    let other_key = db.mapper().object_key(&other).unwrap();
    let mut friends = [-3i64, 7, 12, 100]
        .into_iter()
        .map(|id| Friend {
            parent: Some(key.clone()),
            id,
        })
        .collect::<Vec<_>>();
    friends.push(Friend {
        parent: Some(other_key),
        id: 8,
    });
    let nested_parent = db.mapper().object_key(&friends[1]).unwrap();
    friends.push(Friend {
        parent: Some(nested_parent),
        id: 50,
    });
    db.save_all(&friends).await.unwrap();

    let page = db
        .find_children::<User, Friend>(&user, 2, i64::MIN)
        .await
        .unwrap();
    assert_eq!(page.iter().map(|f| f.id).collect::<Vec<_>>(), vec![-3, 7]);

    let rest = db
        .children_stream::<User, Friend>(&user, 2)
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
    assert_eq!(
        rest.iter().map(|f| f.id).collect::<Vec<_>>(),
        vec![-3, 7, 12, 50, 100]
    );
}

#[tokio::test]
#[ignore]
async fn test_tikv_partial_save() {
    let Some(db) = connect().await else {
        return;
    };
    let tracker = FollowersTracker {
        id: 1,
        should_retrieve_followers: true,
        ..Default::default()
    };
    db.save(&tracker).await.unwrap();

    let mut changed = tracker.clone();
    changed.followers_cursor = 99;
    changed.should_retrieve_followers = false;
    db.save_fields(&changed, &["followers_cursor"]).await.unwrap();

    let stored = db
        .find_by_id::<FollowersTracker>(1i64)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.followers_cursor, 99);
    assert!(stored.should_retrieve_followers);
}
