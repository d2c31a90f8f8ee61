//! NEST recognition service types for the Clova Speech gRPC API
//! (`com.nbp.cdncp.nest.grpc.proto.v1`), authored in the shape
//! `tonic-build` emits; the upstream proto has no published Rust crate.

/// Discriminator for the two request phases: one CONFIG message opens
/// the stream, DATA messages carry audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RequestType {
    Config = 0,
    Data = 1,
}

impl RequestType {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            RequestType::Config => "CONFIG",
            RequestType::Data => "DATA",
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NestConfig {
    /// JSON configuration document.
    #[prost(string, tag = "1")]
    pub config: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NestData {
    /// Raw audio bytes for this chunk.
    #[prost(bytes = "vec", tag = "1")]
    pub chunk: ::prost::alloc::vec::Vec<u8>,
    /// JSON side-channel (sequence id, endpoint flags).
    #[prost(string, tag = "2")]
    pub extra_contents: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NestRequest {
    #[prost(enumeration = "RequestType", tag = "1")]
    pub r#type: i32,
    #[prost(oneof = "nest_request::Part", tags = "2, 3")]
    pub part: ::core::option::Option<nest_request::Part>,
}

/// Nested message and enum types in `NestRequest`.
pub mod nest_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Part {
        #[prost(message, tag = "2")]
        Config(super::NestConfig),
        #[prost(message, tag = "3")]
        Data(super::NestData),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NestResponse {
    /// JSON response document.
    #[prost(string, tag = "1")]
    pub contents: ::prost::alloc::string::String,
}

/// Generated client implementations.
pub mod nest_service_client {
    use tonic::codegen::http::uri::PathAndQuery;

    #[derive(Debug, Clone)]
    pub struct NestServiceClient {
        inner: tonic::client::Grpc<tonic::transport::Channel>,
    }

    impl NestServiceClient {
        pub fn new(channel: tonic::transport::Channel) -> Self {
            Self {
                inner: tonic::client::Grpc::new(channel),
            }
        }

        /// Bidirectional recognition stream: CONFIG first, then DATA
        /// messages; responses carry JSON transcription fragments.
        pub async fn recognize(
            &mut self,
            request: impl tonic::IntoStreamingRequest<Message = super::NestRequest>,
        ) -> std::result::Result<
            tonic::Response<tonic::codec::Streaming<super::NestResponse>>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {e}"))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static(
                "/com.nbp.cdncp.nest.grpc.proto.v1.NestService/recognize",
            );
            self.inner
                .streaming(request.into_streaming_request(), path, codec)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_request_round_trips_through_prost() {
        let request = NestRequest {
            r#type: RequestType::Data as i32,
            part: Some(nest_request::Part::Data(NestData {
                chunk: vec![1, 2, 3, 4],
                extra_contents: r#"{"seqId": 7, "epFlag": false}"#.to_string(),
            })),
        };
        let bytes = request.encode_to_vec();
        let decoded = NestRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_request_type_names() {
        assert_eq!(RequestType::Config.as_str_name(), "CONFIG");
        assert_eq!(RequestType::Data.as_str_name(), "DATA");
    }
}
