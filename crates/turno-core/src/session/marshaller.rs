use crate::error::MarshalError;

use super::{Session, SessionState};

/// Encodes sessions for the on-disk store and populates pooled instances
/// from raw bytes.
pub trait SessionMarshaller: Send + Sync {
    fn marshall(&self, session: &Session) -> Result<Vec<u8>, MarshalError>;
    fn unmarshall(&self, session: &Session, raw: &[u8]) -> Result<(), MarshalError>;
}

/// JSON encoding of the full session state.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarshaller;

impl SessionMarshaller for JsonMarshaller {
    fn marshall(&self, session: &Session) -> Result<Vec<u8>, MarshalError> {
        serde_json::to_vec(&session.snapshot()).map_err(|err| MarshalError::Encode(err.to_string()))
    }

    fn unmarshall(&self, session: &Session, raw: &[u8]) -> Result<(), MarshalError> {
        let state: SessionState =
            serde_json::from_slice(raw).map_err(|err| MarshalError::Decode(err.to_string()))?;
        session.restore(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_state_and_checksum() {
        let session = Session::new("abc123");
        session.put("user", serde_json::json!({"name": "ada"}));
        let checksum = session.checksum();

        let raw = JsonMarshaller.marshall(&session).unwrap();
        let restored = Session::vacant();
        JsonMarshaller.unmarshall(&restored, &raw).unwrap();

        assert_eq!(restored.snapshot(), session.snapshot());
        assert_eq!(restored.checksum(), checksum);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let session = Session::vacant();
        let err = JsonMarshaller.unmarshall(&session, b"not json").unwrap_err();
        assert!(matches!(err, MarshalError::Decode(_)));
        assert_eq!(session.id(), None);
    }
}
