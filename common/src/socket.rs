use socket2::{Domain, Socket, Type};
use std::net::{AddrParseError, SocketAddr};

const DEFAULT_BACKLOG: i32 = 128;

/// Opens a non-blocking listening socket with address and port reuse, so a
/// restarted process can bind while the old one drains its connections.
pub fn listen_reuse_socket(addr: &SocketAddr, backlog: Option<i32>) -> Result<Socket, std::io::Error> {
    let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, None)?;
    socket.set_nonblocking(true)?;
    socket.set_reuse_port(true)?;
    socket.set_reuse_address(true)?;
    socket.bind(&(*addr).into())?;
    socket.listen(backlog.unwrap_or(DEFAULT_BACKLOG))?;
    Ok(socket)
}

/// Parses `host:port`, `:port` or a bare port number.
pub fn parse_address(addr: &str) -> Result<SocketAddr, AddrParseError> {
    let addr = addr.trim();
    if let Some(port) = addr.strip_prefix(':') {
        return format!("0.0.0.0:{}", port).parse();
    }

    if !addr.is_empty() && addr.chars().all(|c| c.is_ascii_digit()) {
        return format!("0.0.0.0:{}", addr).parse();
    }

    addr.parse()
}
