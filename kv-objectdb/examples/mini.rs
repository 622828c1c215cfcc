use kv_objectdb::{Constraints, Entity, Error, Key, ObjectDb, TikvConfig, tikv::TikvStore};

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub age: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct Friend {
    #[objectdb(parent)]
    pub owner: Option<Key>,
    pub id: i64,
    pub note: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let config = TikvConfig::from_env()
        .unwrap_or_else(|| TikvConfig::new(vec!["127.0.0.1:2379".to_string()]));
    let store = TikvStore::connect(&config).await?;
    store.drop_all().await?;

    let db = ObjectDb::new(store);
    let alice = User {
        id: 1,
        name: "Alice".to_string(),
        age: 25,
    };
    db.save(&alice).await?;

    let owner = db.mapper().object_key(&alice)?;
    let friends = (2..=4)
        .map(|id| Friend {
            owner: Some(owner.clone()),
            id,
            note: format!("friend {}", id),
        })
        .collect::<Vec<_>>();
    db.save_all(&friends).await?;

    let a = db
        .find_one_where::<User>(&Constraints::new().with("name", "Alice".to_string()))
        .await?;
    println!("{:?}", a);

    let b = db.find_children::<User, Friend>(&alice, 10, 2).await?;
    println!("{:?}", b);

    db.delete_all(&(alice, friends)).await?;

    Ok(())
}
