use crate::{Entity, error::Error, key::Key, mapper::EntityMapper, record::Record};

/// 一次批量请求中的对象集合，可以混合多个类型
pub trait Bundle {
    fn records(&self, mapper: &EntityMapper) -> Result<Vec<Record>, Error>;

    fn keys(&self, mapper: &EntityMapper) -> Result<Vec<Key>, Error>;
}

impl<T: Entity> Bundle for T {
    fn records(&self, mapper: &EntityMapper) -> Result<Vec<Record>, Error> {
        Ok(vec![mapper.to_record(self)?])
    }

    fn keys(&self, mapper: &EntityMapper) -> Result<Vec<Key>, Error> {
        Ok(vec![mapper.object_key(self)?])
    }
}

impl<T: Entity> Bundle for [T] {
    fn records(&self, mapper: &EntityMapper) -> Result<Vec<Record>, Error> {
        self.iter().map(|object| mapper.to_record(object)).collect()
    }

    fn keys(&self, mapper: &EntityMapper) -> Result<Vec<Key>, Error> {
        self.iter().map(|object| mapper.object_key(object)).collect()
    }
}

impl<T: Entity, const N: usize> Bundle for [T; N] {
    fn records(&self, mapper: &EntityMapper) -> Result<Vec<Record>, Error> {
        self.as_slice().records(mapper)
    }

    fn keys(&self, mapper: &EntityMapper) -> Result<Vec<Key>, Error> {
        self.as_slice().keys(mapper)
    }
}

impl<T: Entity> Bundle for Vec<T> {
    fn records(&self, mapper: &EntityMapper) -> Result<Vec<Record>, Error> {
        self.as_slice().records(mapper)
    }

    fn keys(&self, mapper: &EntityMapper) -> Result<Vec<Key>, Error> {
        self.as_slice().keys(mapper)
    }
}

macro_rules! impl_bundle_for_tuple {
    ($($T:ident),+) => {
        impl<$($T),+> Bundle for ($($T,)+)
        where
            $($T: Bundle,)+
        {
            fn records(&self, mapper: &EntityMapper) -> Result<Vec<Record>, Error> {
                #[allow(non_snake_case)]
                let ($($T,)+) = self;
                let mut records = Vec::new();
                $(
                    records.extend($T.records(mapper)?);
                )+
                Ok(records)
            }

            fn keys(&self, mapper: &EntityMapper) -> Result<Vec<Key>, Error> {
                #[allow(non_snake_case)]
                let ($($T,)+) = self;
                let mut keys = Vec::new();
                $(
                    keys.extend($T.keys(mapper)?);
                )+
                Ok(keys)
            }
        }
    };
}

impl_bundle_for_tuple!(T1);
impl_bundle_for_tuple!(T1, T2);
impl_bundle_for_tuple!(T1, T2, T3);
impl_bundle_for_tuple!(T1, T2, T3, T4);
impl_bundle_for_tuple!(T1, T2, T3, T4, T5);
impl_bundle_for_tuple!(T1, T2, T3, T4, T5, T6);
impl_bundle_for_tuple!(T1, T2, T3, T4, T5, T6, T7);
impl_bundle_for_tuple!(T1, T2, T3, T4, T5, T6, T7, T8);
