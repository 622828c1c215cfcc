use tikv_client::Key as TikvKey;

use crate::key::{Id, Key, Kind};

// 扫描续页：严格大于 key 的最小 key
pub(crate) fn next_key(key: &TikvKey) -> TikvKey {
    let mut next_key = Into::<Vec<u8>>::into(key.clone());
    next_key.push(0);
    TikvKey::from(next_key)
}

// 前缀范围的上界
pub(crate) fn prefix_end(prefix: &str) -> TikvKey {
    let mut end = prefix.as_bytes().to_vec();
    for i in (0..end.len()).rev() {
        if end[i] < 0xff {
            end[i] += 1;
            end.truncate(i + 1);
            return TikvKey::from(end);
        }
    }
    TikvKey::from(end)
}

// 有符号整数偏移后零填充，字典序与数值序一致
pub(crate) fn encode_int(value: i64) -> String {
    let offset_value = (value as i128 + 9223372036854775808) as u128;
    format!("{:020}", offset_value)
}

fn encode_id(id: &Id) -> String {
    match id {
        Id::Int(id) => format!("i{}", encode_int(*id)),
        Id::Name(name) => format!("s{}", name.replace('%', "%25").replace('/', "%2F")),
    }
}

fn ancestor_segments(key: &Key) -> String {
    key.path()
        .iter()
        .map(|k| format!("{}.{}/", k.kind(), encode_id(k.id())))
        .collect()
}

pub(crate) fn kind_prefix(kind: &Kind) -> String {
    format!("record/{}/", kind)
}

/// record/{kind}/{祖先}.../#{id}
pub(crate) fn record_path(key: &Key) -> String {
    let ancestors = key.parent().map(ancestor_segments).unwrap_or_default();
    format!("{}{}#{}", kind_prefix(key.kind()), ancestors, encode_id(key.id()))
}

/// `parent` 下所有 `kind` 类型后代记录的公共前缀，包括隔代的后代
pub(crate) fn descendants_prefix(parent: &Key, kind: &Kind) -> String {
    format!("{}{}", kind_prefix(kind), ancestor_segments(parent))
}
