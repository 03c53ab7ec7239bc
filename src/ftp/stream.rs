use async_ftp::{status, DataStream, FtpStream};
use futures::{future::BoxFuture, FutureExt};
use std::{
    future::Future,
    io, mem,
    pin::Pin,
    task::{ready, Context, Poll},
};
use tokio::{
    io::{AsyncRead, BufReader, ReadBuf},
    runtime::Handle,
    sync::OwnedMutexGuard,
};

pub(super) type Session = OwnedMutexGuard<Option<FtpStream>>;

/// Body of a `RETR` being read from the data connection.
///
/// Owns the control connection until the server confirmed the end of the
/// transfer, so no other command can be sent in between.
pub(super) struct RetrStream {
    path: String,
    state: State,
}

enum State {
    Reading {
        data: BufReader<DataStream>,
        session: Session,
    },
    Finishing(BoxFuture<'static, io::Result<()>>),
    Done,
}

impl RetrStream {
    pub(super) fn new(path: &str, data: BufReader<DataStream>, session: Session) -> Self {
        Self {
            path: path.to_owned(),
            state: State::Reading { data, session },
        }
    }
}

/// Reads the reply that closes a transfer. The data connection must be
/// dropped before.
async fn finish(mut session: Session) -> io::Result<()> {
    let Some(ftp) = session.as_mut() else {
        return Ok(());
    };

    ftp.read_response_in(&[
        status::CLOSING_DATA_CONNECTION,
        status::REQUESTED_FILE_ACTION_OK,
    ])
    .await
    .map(drop)
    .map_err(io::Error::other)
}

impl AsyncRead for RetrStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            match &mut this.state {
                State::Reading { data, .. } => {
                    let before = buf.filled().len();
                    ready!(Pin::new(data).poll_read(cx, buf))?;
                    if buf.filled().len() > before || buf.remaining() == 0 {
                        return Poll::Ready(Ok(()));
                    }

                    // end of data, closes the data connection
                    let done = mem::replace(&mut this.state, State::Done);
                    if let State::Reading { session, .. } = done {
                        this.state = State::Finishing(finish(session).boxed());
                    }
                }
                State::Finishing(closing) => {
                    let result = ready!(closing.as_mut().poll(cx));
                    this.state = State::Done;
                    trace!("retrieved {}", this.path);
                    return Poll::Ready(result);
                }
                State::Done => return Poll::Ready(Ok(())),
            }
        }
    }
}

impl Drop for RetrStream {
    fn drop(&mut self) {
        let closing = match mem::replace(&mut self.state, State::Done) {
            State::Reading { session, .. } => finish(session).boxed(),
            State::Finishing(closing) => closing,
            State::Done => return,
        };

        // the session is released once the pending reply was read
        if let Ok(handle) = Handle::try_current() {
            let path = mem::take(&mut self.path);
            let _ = handle.spawn(async move {
                if let Err(err) = closing.await {
                    warn!("ftp transfer of {path} ended with: {err}");
                }
            });
        }
    }
}
