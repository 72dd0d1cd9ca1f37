//! ---
//! jl_section: "05-boundary-contracts"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Uniform call outcome shared by every boundary client."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use std::fmt;

use tonic::{Code, Response, Status};

/// Status of one boundary call. Clients never raise; every failure is folded in here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStatus {
    /// gRPC status code returned by the peer (or synthesised by tonic).
    Rpc(Code),
    /// HTTP status code of the ingestion response.
    Http(u16),
    /// The request never reached a peer.
    Unreachable(String),
}

impl CallStatus {
    pub fn is_rpc_ok(&self) -> bool {
        matches!(self, CallStatus::Rpc(Code::Ok))
    }

    pub fn http_code(&self) -> Option<u16> {
        match self {
            CallStatus::Http(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Rpc(code) => write!(f, "rpc:{code:?}"),
            CallStatus::Http(code) => write!(f, "http:{code}"),
            CallStatus::Unreachable(reason) => write!(f, "unreachable:{reason}"),
        }
    }
}

/// Status plus decoded body, when the call produced one.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    pub status: CallStatus,
    pub body: Option<T>,
}

impl<T> Reply<T> {
    pub fn rpc_ok(body: T) -> Self {
        Self {
            status: CallStatus::Rpc(Code::Ok),
            body: Some(body),
        }
    }

    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            status: CallStatus::Unreachable(reason.into()),
            body: None,
        }
    }

    /// Fold a tonic result into a reply, mapping the decoded message with `map`.
    pub fn from_rpc<M, F>(result: Result<Response<M>, Status>, map: F) -> Self
    where
        F: FnOnce(M) -> T,
    {
        match result {
            Ok(response) => Self::rpc_ok(map(response.into_inner())),
            Err(status) => Self {
                status: CallStatus::Rpc(status.code()),
                body: None,
            },
        }
    }

    pub fn is_rpc_ok(&self) -> bool {
        self.status.is_rpc_ok()
    }
}

/// What a check counts as a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    RpcOk,
    HttpStatus(u16),
}

impl Expectation {
    pub const HTTP_OK: Expectation = Expectation::HttpStatus(200);

    pub fn matches(&self, status: &CallStatus) -> bool {
        match (self, status) {
            (Expectation::RpcOk, CallStatus::Rpc(code)) => *code == Code::Ok,
            (Expectation::HttpStatus(expected), CallStatus::Http(actual)) => expected == actual,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_errors_keep_their_code() {
        let reply: Reply<()> = Reply::from_rpc::<(), _>(Err(Status::not_found("gone")), |_| ());
        assert_eq!(reply.status, CallStatus::Rpc(Code::NotFound));
        assert!(reply.body.is_none());
    }

    #[test]
    fn expectations_only_match_their_own_status_family() {
        assert!(Expectation::RpcOk.matches(&CallStatus::Rpc(Code::Ok)));
        assert!(!Expectation::RpcOk.matches(&CallStatus::Http(200)));
        assert!(Expectation::HTTP_OK.matches(&CallStatus::Http(200)));
        assert!(!Expectation::HTTP_OK.matches(&CallStatus::Http(202)));
        assert!(!Expectation::HTTP_OK.matches(&CallStatus::Unreachable("refused".into())));
    }
}
