//! TCP session endpoints.
//!
//! The host accepts exactly one viewer per session; the viewer connects
//! exactly once. There is no reconnection and no timeout.

use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::info;

use crate::error::StreamError;

/// A bound listener that will accept a single viewer.
pub struct SessionListener {
    listener: TcpListener,
}

impl SessionListener {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, StreamError> {
        let listener = TcpListener::bind(addr).map_err(StreamError::resource("bind"))?;
        let local = listener
            .local_addr()
            .map_err(StreamError::resource("bind"))?;
        info!("listening on {local}");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, StreamError> {
        self.listener
            .local_addr()
            .map_err(StreamError::resource("bind"))
    }

    /// Block until one viewer connects. The listener is closed afterwards.
    pub fn accept_one(self) -> Result<(TcpStream, SocketAddr), StreamError> {
        let (stream, peer) = self
            .listener
            .accept()
            .map_err(StreamError::resource("accept"))?;
        stream
            .set_nodelay(true)
            .map_err(StreamError::resource("accept"))?;
        info!("viewer connected from {peer}");
        Ok((stream, peer))
    }
}

/// Bind `addr` and block until exactly one viewer connects.
pub fn listen_one<A: ToSocketAddrs>(addr: A) -> Result<(TcpStream, SocketAddr), StreamError> {
    SessionListener::bind(addr)?.accept_one()
}

/// Connect to the host once.
pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<TcpStream, StreamError> {
    let stream = TcpStream::connect(addr).map_err(StreamError::resource("connect"))?;
    stream
        .set_nodelay(true)
        .map_err(StreamError::resource("connect"))?;
    info!("connected to host at {}", stream.peer_addr()?);
    Ok(stream)
}
