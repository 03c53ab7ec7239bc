use russh_sftp::{client::error::Error as SftpError, protocol::StatusCode};

use crate::error::{Backend, Error, Op};

/// Classifies an SFTP error for the operation it came from.
///
/// SFTP v3 has no dedicated status for "exists" or "not empty"; servers
/// answer with a generic failure, which only the operation disambiguates.
pub(crate) fn classify(err: SftpError, op: Op, path: &str) -> Error {
    let SftpError::Status(ref status) = err else {
        return Error::backend(Backend::Sftp, path, err);
    };

    match (status.status_code, op) {
        (StatusCode::NoSuchFile, _) => Error::NotFound(path.to_owned()),
        (StatusCode::Failure, Op::Mkdir) => Error::AlreadyExists(path.to_owned()),
        (StatusCode::Failure, Op::Rmdir) => Error::NotEmpty(path.to_owned()),
        (StatusCode::NoConnection | StatusCode::ConnectionLost, _) => {
            Error::Connection(format!("{path}: {}", status.error_message))
        }
        _ => Error::backend(Backend::Sftp, path, err),
    }
}

pub(crate) fn is_no_such_file(err: &SftpError) -> bool {
    matches!(err, SftpError::Status(status) if status.status_code == StatusCode::NoSuchFile)
}
