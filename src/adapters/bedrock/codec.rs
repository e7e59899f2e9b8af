/// Bedrock game-layer framing
///
/// Every RakNet user frame starts with `0xFE` and carries a batch of
/// length-prefixed game packets. After NetworkSettings the batch is
/// compressed, and after the encryption handshake the whole batch body is
/// encrypted (see `crypto`).

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use thiserror::Error;

/// First byte of every game frame
pub const FRAME_HEADER: u8 = 0xFE;

/// Upper bound for a decompressed batch
const MAX_BATCH_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unexpected end of packet")]
    UnexpectedEof,
    #[error("varint is too long")]
    VarIntTooLong,
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("unexpected frame header 0x{0:02X}")]
    BadFrame(u8),
    #[error("unknown compression algorithm 0x{0:02X}")]
    UnknownCompression(u8),
    #[error("compression failed: {0}")]
    Compression(String),
    #[error("packet checksum mismatch")]
    ChecksumMismatch,
    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// Cursor over a packet body
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < n {
            return Err(ProtocolError::UnexpectedEof);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32_be(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_var_u32(&mut self) -> Result<u32, ProtocolError> {
        let mut value: u32 = 0;
        for i in 0..5 {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7F) as u32) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ProtocolError::VarIntTooLong)
    }

    pub fn read_var_u64(&mut self) -> Result<u64, ProtocolError> {
        let mut value: u64 = 0;
        for i in 0..10 {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7F) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ProtocolError::VarIntTooLong)
    }

    pub fn read_var_i32(&mut self) -> Result<i32, ProtocolError> {
        let raw = self.read_var_u32()?;
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    pub fn read_var_i64(&mut self) -> Result<i64, ProtocolError> {
        let raw = self.read_var_u64()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_var_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }
}

/// Growable packet body
#[derive(Debug, Default)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a game packet with its header
    pub fn with_id(id: u32) -> Self {
        let mut writer = Self::new();
        writer.write_var_u32(id);
        writer
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    pub fn write_u16_le(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32_be(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_var_u32(&mut self, mut value: u32) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    pub fn write_var_u64(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    pub fn write_var_i32(&mut self, value: i32) {
        self.write_var_u32(((value << 1) ^ (value >> 31)) as u32);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_var_u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Split a game packet into its id and body reader
pub fn split_packet(packet: &[u8]) -> Result<(u32, PacketReader<'_>), ProtocolError> {
    let mut reader = PacketReader::new(packet);
    let header = reader.read_var_u32()?;
    Ok((header & 0x3FF, reader))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    Zlib,
    Snappy,
    None,
}

impl CompressionAlgorithm {
    /// Map the NetworkSettings algorithm field
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionAlgorithm::Zlib,
            1 => CompressionAlgorithm::Snappy,
            _ => CompressionAlgorithm::None,
        }
    }

    /// Per-batch algorithm marker
    pub fn header_byte(&self) -> u8 {
        match self {
            CompressionAlgorithm::Zlib => 0x00,
            CompressionAlgorithm::Snappy => 0x01,
            CompressionAlgorithm::None => 0xFF,
        }
    }

    fn from_header_byte(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x00 => Ok(CompressionAlgorithm::Zlib),
            0x01 => Ok(CompressionAlgorithm::Snappy),
            0xFF => Ok(CompressionAlgorithm::None),
            other => Err(ProtocolError::UnknownCompression(other)),
        }
    }
}

/// How batches are (de)compressed on this connection
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    pub compression_enabled: bool,
    pub algorithm: CompressionAlgorithm,
    pub threshold: usize,
    /// Batches carry a leading algorithm byte (protocol 649 and later)
    pub algorithm_header: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            compression_enabled: false,
            algorithm: CompressionAlgorithm::Zlib,
            threshold: 0,
            algorithm_header: true,
        }
    }
}

fn compress(algorithm: CompressionAlgorithm, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    match algorithm {
        CompressionAlgorithm::Zlib => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(data)
                .map_err(|e| ProtocolError::Compression(e.to_string()))?;
            encoder.finish().map_err(|e| ProtocolError::Compression(e.to_string()))
        }
        CompressionAlgorithm::Snappy => snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| ProtocolError::Compression(e.to_string())),
        CompressionAlgorithm::None => Ok(data.to_vec()),
    }
}

fn decompress(algorithm: CompressionAlgorithm, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    match algorithm {
        CompressionAlgorithm::Zlib => {
            let mut out = Vec::new();
            DeflateDecoder::new(data)
                .take(MAX_BATCH_SIZE)
                .read_to_end(&mut out)
                .map_err(|e| ProtocolError::Compression(e.to_string()))?;
            Ok(out)
        }
        CompressionAlgorithm::Snappy => snap::raw::Decoder::new()
            .decompress_vec(data)
            .map_err(|e| ProtocolError::Compression(e.to_string())),
        CompressionAlgorithm::None => Ok(data.to_vec()),
    }
}

/// Encode packets into a batch body (everything after the frame header)
pub fn encode_batch(packets: &[Vec<u8>], config: &BatchConfig) -> Result<Vec<u8>, ProtocolError> {
    let mut payload = PacketWriter::new();
    for packet in packets {
        payload.write_var_u32(packet.len() as u32);
        payload.write_bytes(packet);
    }
    let payload = payload.into_inner();

    if !config.compression_enabled {
        return Ok(payload);
    }

    if !config.algorithm_header {
        return compress(CompressionAlgorithm::Zlib, &payload);
    }

    let algorithm = if payload.len() < config.threshold {
        CompressionAlgorithm::None
    } else {
        config.algorithm
    };

    let mut body = Vec::with_capacity(payload.len() + 1);
    body.push(algorithm.header_byte());
    body.extend(compress(algorithm, &payload)?);
    Ok(body)
}

/// Decode a batch body into its game packets
pub fn decode_batch(body: &[u8], config: &BatchConfig) -> Result<Vec<Vec<u8>>, ProtocolError> {
    let payload = if !config.compression_enabled {
        body.to_vec()
    } else if !config.algorithm_header {
        decompress(CompressionAlgorithm::Zlib, body)?
    } else {
        let (&marker, rest) = body.split_first().ok_or(ProtocolError::UnexpectedEof)?;
        decompress(CompressionAlgorithm::from_header_byte(marker)?, rest)?
    };

    let mut reader = PacketReader::new(&payload);
    let mut packets = Vec::new();
    while reader.remaining() > 0 {
        let len = reader.read_var_u32()? as usize;
        packets.push(reader.take(len)?.to_vec());
    }
    Ok(packets)
}
