//! TCP transport over `std::net`.
//!
//! ESP-IDF's std backs these types with lwIP, so the exact same code runs
//! on the target and in host tests. The listener is built through `socket2`
//! because `std::net::TcpListener::bind` hardwires a large backlog; the
//! bridge wants it tiny so extra connectors queue at the stack instead of
//! piling up behind a single-client server.

use std::io;
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream};

use log::info;
use socket2::{Domain, Socket, Type};

use crate::driver::{ClientConn, NetListener};

/// Bind the bridge listener on all interfaces.
pub fn bind_listener(port: u16, backlog: i32) -> io::Result<TcpListener> {
    let addr = SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    let socket = Socket::new(Domain::IPV4, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    info!("bound tcp listener on port {port}");
    Ok(socket.into())
}

impl NetListener for TcpListener {
    type Conn = TcpStream;

    fn accept(&mut self) -> io::Result<TcpStream> {
        let (conn, peer) = TcpListener::accept(self)?;
        info!("accepted client {peer}");
        Ok(conn)
    }
}

impl ClientConn for TcpStream {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(self, buf)
    }

    fn try_clone(&self) -> io::Result<Self> {
        TcpStream::try_clone(self)
    }

    fn shutdown(&self) {
        let _ = TcpStream::shutdown(self, Shutdown::Both);
    }
}
