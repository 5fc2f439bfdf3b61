// Tests for the request builders and reply decoders.

use byteorder::{WriteBytesExt, LE};

use crate::decoder::Value;
use crate::frame::{Command, Frame, RESPONSE_STATE_FLAGS};
use crate::index;
use crate::request::*;
use crate::response::*;
use crate::symbol::{DataType, Symbol};
use crate::test::{test_symbol_table, test_symbols};
use crate::{AmsAddr, AmsNetId, Error};

fn builder() -> RequestBuilder {
    RequestBuilder::new(AmsAddr::new(AmsNetId::new(5, 23, 1, 1, 1, 1), 851),
                        AmsAddr::new(AmsNetId::new(10, 0, 0, 2, 1, 1), 58913))
}

fn reply(command: Command, invoke_id: u32, data: Vec<u8>) -> Frame {
    let b = builder();
    Frame {
        target: b.source(),
        source: b.target(),
        command,
        state_flags: RESPONSE_STATE_FLAGS,
        result: 0,
        invoke_id,
        data,
    }
}

fn sym(name: &str, data_type: DataType, index_offset: u32, size: u32) -> Symbol {
    Symbol {
        name: name.into(),
        index_group: 0x4040,
        index_offset,
        data_type,
        type_name: String::new(),
        size,
        array_dimensions: None,
    }
}

fn words(data: &[u8]) -> Vec<u32> {
    data.chunks(4).map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

#[test]
fn test_requests() {
    let b = builder();
    let req = b.symbol_length_request();
    assert_eq!(req.kind, RequestKind::SymbolLength);
    assert_eq!(req.command(), Command::Read);
    assert_eq!(words(&req.frame.data), [index::SYM_UPLOAD_INFO2, 0, 0x30]);

    let req = b.symbol_table_request(1234);
    assert_eq!(req.kind, RequestKind::SymbolTable { length: 1234 });
    assert_eq!(words(&req.frame.data), [index::SYM_UPLOAD, 0, 1234]);

    let symbols = vec![sym("a", DataType::Int, 0, 2), sym("b", DataType::DInt, 8, 4)];
    let req = b.multi_read_request(&symbols).unwrap();
    assert_eq!(req.command(), Command::ReadWrite);
    assert_eq!(req.frame.target, b.target());
    assert_eq!(req.frame.source, b.source());
    assert_eq!(words(&req.frame.data), [index::SUMUP_READ, 2, 6 + 8, 24,
                                        0x4040, 0, 2,
                                        0x4040, 8, 4]);
    assert_eq!(req.kind, RequestKind::MultiRead { symbols });
}

#[test]
fn test_oversized_multi_read() {
    let symbols = vec![sym("a", DataType::Int, 0, 2), sym("huge", DataType::Void, 4, u32::MAX - 2)];
    assert!(matches!(builder().multi_read_request(&symbols), Err(Error::Overflow(_))));
}

#[test]
fn test_symbol_length_response() {
    let mut data = vec![0; 56];
    data[4..8].copy_from_slice(&0x30u32.to_le_bytes());
    data[12..16].copy_from_slice(&4711u32.to_le_bytes());
    let resp = SymbolLengthResponse::decode(&reply(Command::Read, 3, data.clone()), 3).unwrap();
    assert_eq!(resp.symbol_length, 4711);

    data[0..4].copy_from_slice(&0x701u32.to_le_bytes());
    assert!(matches!(SymbolLengthResponse::decode(&reply(Command::Read, 3, data), 3),
                     Err(Error::Ads(_, _, 0x701))));
    assert!(matches!(SymbolLengthResponse::decode(&reply(Command::Read, 3, vec![0; 4]), 3),
                     Err(Error::Reply(_, "got less data than expected", 4))));
    assert!(matches!(SymbolLengthResponse::decode(&reply(Command::Read, 3, vec![0; 8]), 3),
                     Err(Error::Decode(_))));
}

#[test]
fn test_symbol_table_response() {
    let table = test_symbol_table();
    let mut data = Vec::new();
    data.write_u32::<LE>(0).unwrap();
    data.write_u32::<LE>(table.len() as u32).unwrap();
    data.extend(&table);

    let frame = reply(Command::Read, 9, data);
    let resp = SymbolTableResponse::decode(&frame, table.len() as u32, 9).unwrap();
    let names = resp.symbols.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
    let expected = test_symbols().iter().map(|s| s.name).collect::<Vec<_>>();
    assert_eq!(names, expected);

    assert!(matches!(SymbolTableResponse::decode(&frame, table.len() as u32 + 1, 9),
                     Err(Error::Reply(_, "got less data than expected", _))));
    assert!(matches!(SymbolTableResponse::decode(&frame, table.len() as u32, 8),
                     Err(Error::Reply(_, "unexpected invoke ID", 9))));
}

#[test]
fn test_multi_read_response() {
    let symbols = vec![sym("a", DataType::Int, 0, 2),
                       sym("b", DataType::DInt, 2, 4),
                       sym("c", DataType::Byte, 6, 1)];
    let mut data = Vec::new();
    data.write_u32::<LE>(0).unwrap();
    data.write_u32::<LE>(12 + 7).unwrap();
    for code in [0u32, 5, 0].iter() {
        data.write_u32::<LE>(*code).unwrap();
    }
    data.write_i16::<LE>(-3).unwrap();
    data.write_i32::<LE>(0).unwrap();
    data.write_u8(42).unwrap();

    let frame = reply(Command::ReadWrite, 1, data.clone());
    let resp = MultiReadResponse::decode(&frame, &symbols, 1).unwrap();
    assert_eq!(resp.results.len(), 3);
    assert_eq!(resp.results[0].value, Some(Value::Int(-3)));
    assert_eq!(resp.results[0].result, 0);
    assert_eq!(resp.results[1].value, None);
    assert_eq!(resp.results[1].result, 5);
    assert_eq!(resp.results[1].symbol.name, "b");
    assert_eq!(resp.results[2].value, Some(Value::Byte(42)));
    assert!(resp.results.iter().all(|r| r.timestamp == resp.results[0].timestamp));

    // A failed sum-up read fails as a whole.
    data[0..4].copy_from_slice(&0x701u32.to_le_bytes());
    let frame = reply(Command::ReadWrite, 1, data);
    assert!(matches!(MultiReadResponse::decode(&frame, &symbols, 1),
                     Err(Error::Ads(_, "Service is not supported by server", 0x701))));

    let frame = reply(Command::ReadWrite, 1, vec![0; 8]);
    assert!(matches!(MultiReadResponse::decode(&frame, &symbols, 1),
                     Err(Error::Reply(_, "got less data than expected", 8))));
}

#[test]
fn test_response_dispatch() {
    let b = builder();
    let mut data = vec![0; 56];
    data[12..16].copy_from_slice(&100u32.to_le_bytes());
    let frame = reply(Command::Read, 4, data);

    let resp = Response::decode(&b.symbol_length_request(), &frame, 4).unwrap();
    assert_eq!(resp, Response::SymbolLength(SymbolLengthResponse { symbol_length: 100 }));

    // The same reply is not valid for a multi-read.
    let req = b.multi_read_request(&[sym("a", DataType::Int, 0, 2)]).unwrap();
    assert!(matches!(Response::decode(&req, &frame, 4),
                     Err(Error::Reply(_, "unexpected command", 2))));
}
