//! Generated types for the `piston.v2.ExecuteCodeService` gRPC contract.
//!
//! `proto/piston.proto` is the single source; `build.rs` compiles it.

tonic::include_proto!("piston.v2");

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_explicit_zero_limit_keeps_presence() {
        let req = ExecuteRequest {
            language: "python".to_string(),
            version: "3.12.0".to_string(),
            run_timeout: Some(0),
            ..Default::default()
        };

        let decoded = ExecuteRequest::decode(req.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.run_timeout, Some(0));
        assert_eq!(decoded.compile_timeout, None);
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_file_fields_are_optional() {
        let file = File::default();
        assert_eq!(file.name, None);
        assert_eq!(file.encoding, None);
    }
}
