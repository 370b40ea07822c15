//! Process-global serialization registry.
//!
//! Maps message identity ↔ wire name ↔ (encode, decode) in both directions.
//! A message type is remote-capable exactly when it has been registered
//! here. Registration is expected at process start, is idempotent, and may
//! overwrite; lookups are read-mostly and mutex-guarded.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use axon_runtime::Message;

use crate::error::{RemoteError, Result};

type EncodeFn = Arc<dyn Fn(&dyn Message) -> Result<Value> + Send + Sync>;
type DecodeFn = Arc<dyn Fn(&Value) -> Result<Box<dyn Message>> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    wire_name: String,
    encode: EncodeFn,
    decode: DecodeFn,
}

#[derive(Default)]
struct Registry {
    by_id: HashMap<u32, Entry>,
    by_name: HashMap<String, Entry>,
}

static REGISTRY: LazyLock<Mutex<Registry>> = LazyLock::new(|| Mutex::new(Registry::default()));

/// Register a message type for remote transport under `wire_name`.
///
/// The identity is taken from `M::default()`, matching what instances of
/// `M` report at send time. Registering the same identity again overwrites
/// the previous entry.
pub fn register<M>(wire_name: &str)
where
    M: Message + Serialize + DeserializeOwned + Default,
{
    let id = M::default().message_id();
    let encode_name = wire_name.to_string();
    let encode: EncodeFn = Arc::new(move |msg| {
        let typed = msg
            .as_any()
            .downcast_ref::<M>()
            .ok_or(RemoteError::TypeMismatch { id })?;
        serde_json::to_value(typed).map_err(|e| RemoteError::encode(&encode_name, e))
    });
    let decode_name = wire_name.to_string();
    let decode: DecodeFn = Arc::new(move |value| {
        let typed: M = serde_json::from_value(value.clone())
            .map_err(|e| RemoteError::decode(&decode_name, e))?;
        Ok(Box::new(typed) as Box<dyn Message>)
    });

    let entry = Entry {
        wire_name: wire_name.to_string(),
        encode,
        decode,
    };
    let mut registry = REGISTRY.lock();
    registry.by_name.insert(wire_name.to_string(), entry.clone());
    registry.by_id.insert(id, entry);
}

/// Wire name registered for a message identity.
pub fn wire_name_of(id: u32) -> Option<String> {
    REGISTRY.lock().by_id.get(&id).map(|e| e.wire_name.clone())
}

/// `true` when a decoder exists for this wire name.
pub fn is_registered(wire_name: &str) -> bool {
    REGISTRY.lock().by_name.contains_key(wire_name)
}

/// Encode a message to its wire payload.
pub fn encode(msg: &dyn Message) -> Result<Value> {
    let entry = REGISTRY
        .lock()
        .by_id
        .get(&msg.message_id())
        .cloned()
        .ok_or(RemoteError::Unregistered {
            id: msg.message_id(),
        })?;
    (entry.encode)(msg)
}

/// Decode a wire payload into a message.
pub fn decode(wire_name: &str, payload: &Value) -> Result<Box<dyn Message>> {
    let entry = REGISTRY
        .lock()
        .by_name
        .get(wire_name)
        .cloned()
        .ok_or_else(|| RemoteError::UnknownWireType {
            name: wire_name.to_string(),
        })?;
    (entry.decode)(payload)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use axon_runtime::define_message;

    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Sample {
        count: u64,
        label: String,
    }
    define_message!(Sample, 310);

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Claimed {
        count: u64,
    }
    define_message!(Claimed, 311);

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Imposter {
        count: u64,
    }
    define_message!(Imposter, 311);

    #[test]
    fn roundtrip_through_registry() {
        register::<Sample>("Sample");
        assert_eq!(wire_name_of(310).as_deref(), Some("Sample"));
        assert!(is_registered("Sample"));

        let original = Sample {
            count: 9,
            label: "x".into(),
        };
        let payload = encode(&original).unwrap();
        let decoded = decode("Sample", &payload).unwrap();
        assert_eq!(decoded.downcast_ref::<Sample>().unwrap(), &original);
    }

    #[test]
    fn unregistered_identity_is_an_error() {
        #[derive(Serialize)]
        struct Stray;
        define_message!(Stray, 399);
        assert!(matches!(
            encode(&Stray),
            Err(RemoteError::Unregistered { id: 399 })
        ));
        assert!(wire_name_of(399).is_none());
    }

    #[test]
    fn unknown_wire_name_is_an_error() {
        assert!(matches!(
            decode("NoSuchType", &Value::Null),
            Err(RemoteError::UnknownWireType { .. })
        ));
    }

    #[test]
    fn decode_failure_reports_wire_name() {
        register::<Sample>("Sample");
        let bad = serde_json::json!({ "count": "not a number" });
        match decode("Sample", &bad) {
            Err(RemoteError::Decode { wire_name, .. }) => assert_eq!(wire_name, "Sample"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn identity_collision_with_wrong_type_is_detected() {
        // Claimed and Imposter share identity 311; whichever registration
        // ran last owns the identity, and encoding the other type fails
        // rather than producing a mislabeled payload.
        register::<Claimed>("Claimed");
        register::<Imposter>("Imposter");
        assert!(matches!(
            encode(&Claimed::default()),
            Err(RemoteError::TypeMismatch { id: 311 })
        ));
    }
}
