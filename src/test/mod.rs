// Code used in the crate test suite.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::mem::size_of;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use byteorder::{WriteBytesExt, LE};
use once_cell::sync::Lazy;
use zerocopy::{FromBytes, FromZeros, IntoBytes};

use crate::frame::{AmsTcpHeader, Command, Frame, RESPONSE_STATE_FLAGS};
use crate::index;
use crate::request::{IndexLength, IndexLengthRW};

mod test_codec;
mod test_response;

// Since Cargo tests run multi-threaded, start one server per thread and
// handle clients from the test functions in that thread.
thread_local! {
    pub static SERVER: Lazy<(u16, Arc<Mutex<ServerOpts>>)> = Lazy::new(|| {
        let opts = Arc::new(Mutex::new(ServerOpts::default()));

        let socket = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = socket.local_addr().unwrap().port();
        let opts_server = opts.clone();
        thread::spawn(move || {
            let mut server = Server::new(opts_server);
            for client in socket.incoming().flatten() {
                // We only need to handle one client concurrently.
                server.handle_client(client);
            }
        });

        (port, opts)
    });
}

// Configures different ways the server should behave.
#[derive(Clone, Default)]
pub struct ServerOpts {
    /// Read requests, but never reply.
    pub no_reply: bool,
    /// Reply with invoke ID 0.
    pub ignore_invokeid: bool,
    /// Reply with a negative length in the AMS/TCP header.
    pub negative_length: bool,
    /// Write the reply byte by byte, sleeping before each byte.
    pub byte_delay: Option<Duration>,
    /// Overall result of sum-up reads.
    pub sumup_error: u32,
}

pub fn config_test_server(opts: ServerOpts) -> u16 {
    SERVER.with(|obj| {
        let (port, server_opts) = &**obj;
        *server_opts.lock().unwrap() = opts;
        *port
    })
}

/// Index group of all simulated PLC variables.
pub const TEST_GROUP: u32 = 0x4040;

/// A variable of the simulated PLC.
pub struct TestSymbol {
    pub name: &'static str,
    pub index_offset: u32,
    pub type_name: &'static str,
    pub size: u32,
    /// None if reading the variable fails with "symbol not found".
    pub value: Option<Vec<u8>>,
}

pub fn test_symbols() -> Vec<TestSymbol> {
    let mut text = b"hello".to_vec();
    text.resize(81, 0);
    let matrix = (1..=6i16).flat_map(|v| v.to_le_bytes()).collect::<Vec<_>>();
    vec![
        TestSymbol { name: "MAIN.counter", index_offset: 0, type_name: "INT",
                     size: 2, value: Some(1234i16.to_le_bytes().to_vec()) },
        TestSymbol { name: "MAIN.bytes", index_offset: 2, type_name: "ARRAY [0..3] OF BYTE",
                     size: 4, value: Some(vec![1, 2, 3, 4]) },
        TestSymbol { name: "MAIN.text", index_offset: 6, type_name: "STRING(80)",
                     size: 81, value: Some(text) },
        TestSymbol { name: "MAIN.matrix", index_offset: 87, type_name: "ARRAY [0..2,0..1] OF INT",
                     size: 12, value: Some(matrix) },
        TestSymbol { name: "MAIN.temperature", index_offset: 99, type_name: "REAL",
                     size: 4, value: Some(21.5f32.to_le_bytes().to_vec()) },
        TestSymbol { name: "MAIN.gone", index_offset: 103, type_name: "DINT",
                     size: 4, value: None },
    ]
}

/// Encode one entry of the symbol table.
pub fn symbol_entry(name: &str, index_group: u32, index_offset: u32, size: u32,
                    type_name: &str) -> Vec<u8> {
    let comment = "";
    let len = 30 + name.len() + 1 + type_name.len() + 1 + comment.len() + 1;
    let mut out = Vec::with_capacity(len);
    out.write_u32::<LE>(len as u32).unwrap();
    out.write_u32::<LE>(index_group).unwrap();
    out.write_u32::<LE>(index_offset).unwrap();
    out.write_u32::<LE>(size).unwrap();
    out.write_u32::<LE>(0).unwrap(); // type ID
    out.write_u32::<LE>(0).unwrap(); // flags
    out.write_u16::<LE>(name.len() as u16).unwrap();
    out.write_u16::<LE>(type_name.len() as u16).unwrap();
    out.write_u16::<LE>(comment.len() as u16).unwrap();
    for s in [name, type_name, comment].iter() {
        out.extend(s.as_bytes());
        out.push(0);
    }
    out
}

/// The symbol table of the simulated PLC.
pub fn test_symbol_table() -> Vec<u8> {
    test_symbols()
        .iter()
        .flat_map(|s| symbol_entry(s.name, TEST_GROUP, s.index_offset, s.size, s.type_name))
        .collect()
}

struct Server {
    opts: Arc<Mutex<ServerOpts>>,
    table: Vec<u8>,
    values: HashMap<(u32, u32), Vec<u8>>,
}

impl Server {
    fn new(opts: Arc<Mutex<ServerOpts>>) -> Self {
        let values = test_symbols()
            .into_iter()
            .filter_map(|s| Some(((TEST_GROUP, s.index_offset), s.value?)))
            .collect();
        Server { opts, table: test_symbol_table(), values }
    }

    fn handle_client(&mut self, mut socket: TcpStream) {
        loop {
            let mut tcp_header = AmsTcpHeader::new_zeroed();
            if socket.read_exact(tcp_header.as_mut_bytes()).is_err() {
                // connection was closed
                return;
            }
            let mut packet = vec![0; tcp_header.length.get() as usize];
            if socket.read_exact(&mut packet).is_err() {
                return;
            }
            let request = Frame::decode(&packet).unwrap();
            println!("req: {:?}", request);
            let opts = self.opts.lock().unwrap().clone();
            if opts.no_reply {
                continue;
            }

            let (data, error) = match request.command {
                Command::Read => self.do_read(&request.data),
                Command::ReadWrite => self.do_read_write(&request.data, opts.sumup_error),
                _ => (vec![], 0x701),
            };
            // A decoded request has the client as its target.
            let reply = Frame {
                target: request.target,
                source: request.source,
                command: request.command,
                state_flags: RESPONSE_STATE_FLAGS,
                result: error,
                invoke_id: 0,
                data,
            };
            let invoke_id = if opts.ignore_invokeid { 0 } else { request.invoke_id };
            let mut bytes = reply.encode(invoke_id).unwrap();
            if opts.negative_length {
                bytes[2..6].copy_from_slice(&(-1i32).to_le_bytes());
            }

            if let Some(delay) = opts.byte_delay {
                for byte in bytes {
                    thread::sleep(delay);
                    if socket.write_all(&[byte]).is_err() {
                        return;
                    }
                }
            } else if socket.write_all(&bytes).is_err() {
                return;
            }
        }
    }

    fn do_read(&self, data: &[u8]) -> (Vec<u8>, u32) {
        let request = match IndexLength::read_from_bytes(data) {
            Ok(request) => request,
            Err(_) => return (vec![], 0x706),
        };
        let len = request.length.get();
        let mut out = Vec::new();
        out.write_u32::<LE>(0).unwrap();
        match request.index_group.get() {
            index::SYM_UPLOAD_INFO2 => {
                if len != index::SYM_UPLOAD_INFO2_LEN {
                    return (vec![], 0x705);
                }
                out.write_u32::<LE>(len).unwrap();
                out.write_u32::<LE>(test_symbols().len() as u32).unwrap();
                out.write_u32::<LE>(self.table.len() as u32).unwrap();
                out.resize(8 + len as usize, 0);
            }
            index::SYM_UPLOAD => {
                if (len as usize) < self.table.len() {
                    return (vec![], 0x705);
                }
                out.write_u32::<LE>(self.table.len() as u32).unwrap();
                out.extend(&self.table);
            }
            _ => return (vec![], 0x702),
        }
        (out, 0)
    }

    fn do_read_write(&self, data: &[u8], sumup_error: u32) -> (Vec<u8>, u32) {
        let (request, items) = match IndexLengthRW::read_from_prefix(data) {
            Ok(split) => split,
            Err(_) => return (vec![], 0x706),
        };
        if request.index_group.get() != index::SUMUP_READ {
            return (vec![], 0x702);
        }
        let count = request.index_offset.get() as usize;
        if items.len() != count * size_of::<IndexLength>() {
            return (vec![], 0x706);
        }

        let mut codes = Vec::new();
        let mut values = Vec::new();
        for item in items.chunks(size_of::<IndexLength>()) {
            let item = IndexLength::read_from_bytes(item).unwrap();
            let key = (item.index_group.get(), item.index_offset.get());
            let len = item.length.get() as usize;
            match self.values.get(&key) {
                Some(value) if value.len() == len => {
                    codes.write_u32::<LE>(0).unwrap();
                    values.extend(value);
                }
                _ => {
                    codes.write_u32::<LE>(0x710).unwrap();
                    values.resize(values.len() + len, 0);
                }
            }
        }

        let mut out = Vec::new();
        out.write_u32::<LE>(sumup_error).unwrap();
        out.write_u32::<LE>((codes.len() + values.len()) as u32).unwrap();
        out.extend(codes);
        out.extend(values);
        (out, 0)
    }
}
