//! JSON payloads carried by the request/response frames.
//!
//! Field names are part of the wire format and stay snake_case.

use serde::{Deserialize, Serialize};

/// Sender -> relay. An empty (or missing) share code asks the relay to pick one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileSendRequest {
    #[serde(default)]
    pub share_code: String,
    pub filename: String,
    pub filesize: u64,
}

/// Relay -> sender, with the code the receiver has to present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileSendResponse {
    pub share_code: String,
}

/// Receiver -> relay.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileRecvRequest {
    pub share_code: String,
}

/// Relay -> receiver, describing the file that is about to be streamed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileRecvResponse {
    pub filename: String,
    pub filesize: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_request_field_names() {
        let request = FileSendRequest {
            share_code: "ABC123".to_string(),
            filename: "hello.txt".to_string(),
            filesize: 5,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["share_code"], "ABC123");
        assert_eq!(json["filename"], "hello.txt");
        assert_eq!(json["filesize"], 5);
    }

    #[test]
    fn test_send_request_without_share_code() {
        let request: FileSendRequest =
            serde_json::from_str(r#"{"filename":"a.bin","filesize":1024}"#).unwrap();

        assert!(request.share_code.is_empty());
        assert_eq!(request.filename, "a.bin");
        assert_eq!(request.filesize, 1024);
    }

    #[test]
    fn test_recv_response_unicode_filename() {
        let response = FileRecvResponse {
            filename: "файл.txt".to_string(),
            filesize: 42,
        };

        let json = serde_json::to_vec(&response).unwrap();
        let decoded: FileRecvResponse = serde_json::from_slice(&json).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_recv_request_requires_share_code() {
        let result = serde_json::from_str::<FileRecvRequest>("{}");
        assert!(result.is_err());
    }
}
