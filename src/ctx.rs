//! The configuration tree threaded through verification and build.
//!
//! `Ctx` is a structured JSON-like value rather than a flat string map, so
//! hook authors can nest configuration arbitrarily and merging is a
//! structural operation instead of a key-prefix convention.

pub type Ctx = serde_json::Value;

/// Deep-merge `extra` onto `base`. Objects merge key by key; leaf
/// conflicts and arrays are resolved by taking `extra`'s value wholesale.
pub fn deep_merge(base: &Ctx, extra: &Ctx) -> Ctx {
    match (base, extra) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(extra_map)) => {
            let mut merged = base_map.clone();
            for (key, extra_val) in extra_map {
                match merged.get(key) {
                    Some(base_val) => {
                        let new_val = deep_merge(base_val, extra_val);
                        merged.insert(key.clone(), new_val);
                    }
                    None => {
                        merged.insert(key.clone(), extra_val.clone());
                    }
                }
            }
            serde_json::Value::Object(merged)
        }
        (_, extra) => extra.clone(),
    }
}
