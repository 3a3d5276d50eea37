//! Script chunk parsing and encoding.
//!
//! A chunk is either a bare opcode or a push opcode together with the bytes it
//! pushes. Decoding is lenient about how a push was encoded; the builders in
//! this module always produce the minimal form.

use crate::opcodes::*;
use crate::ScriptError;

/// A single parsed element of a script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptChunk {
    /// The opcode byte. For direct pushes (1-75 bytes) this is the length.
    pub op: u8,
    /// Pushed bytes for push opcodes. For an `OP_RETURN` at the top level this
    /// holds the unparsed remainder of the script, if any.
    pub data: Option<Vec<u8>>,
}

impl ScriptChunk {
    /// A chunk holding a bare opcode.
    pub fn opcode(op: u8) -> Self {
        ScriptChunk { op, data: None }
    }

    /// The minimal chunk that pushes `data`.
    ///
    /// Empty data becomes `OP_0`, single bytes 1..=16 become `OP_1`..`OP_16`,
    /// `0x81` becomes `OP_1NEGATE`, and everything else uses the shortest
    /// length prefix.
    pub fn push(data: &[u8]) -> Self {
        match data {
            [] => ScriptChunk::opcode(OP_0),
            [n @ 1..=16] => ScriptChunk::opcode(OP_1 + n - 1),
            [0x81] => ScriptChunk::opcode(OP_1NEGATE),
            _ => ScriptChunk {
                op: minimal_push_opcode(data.len()),
                data: Some(data.to_vec()),
            },
        }
    }

    /// True for opcodes up to and including `OP_16`.
    pub fn is_push(&self) -> bool {
        self.op <= OP_16
    }

    /// The value this chunk leaves on the stack when executed, or `None` for
    /// non-push opcodes.
    pub fn push_value(&self) -> Option<Vec<u8>> {
        match self.op {
            OP_0 => Some(Vec::new()),
            OP_1NEGATE => Some(vec![0x81]),
            OP_RESERVED => None,
            op if op >= OP_1 && op <= OP_16 => Some(vec![op - OP_1 + 1]),
            op if op <= OP_PUSHDATA4 => Some(self.data.clone().unwrap_or_default()),
            _ => None,
        }
    }

    /// Whether this push uses the smallest possible encoding. Non-push
    /// opcodes are trivially minimal.
    pub fn is_minimal_push(&self) -> bool {
        if self.op > OP_PUSHDATA4 || self.op == OP_0 {
            return true;
        }
        let data = self.data.as_deref().unwrap_or_default();
        match data {
            [] => false,
            [1..=16] | [0x81] => false,
            _ => self.op == minimal_push_opcode(data.len()),
        }
    }

    /// Append the wire encoding of this chunk to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.op);
        let Some(data) = &self.data else {
            return;
        };
        match self.op {
            OP_PUSHDATA1 => out.push(data.len() as u8),
            OP_PUSHDATA2 => out.extend_from_slice(&(data.len() as u16).to_le_bytes()),
            OP_PUSHDATA4 => out.extend_from_slice(&(data.len() as u32).to_le_bytes()),
            _ => {}
        }
        out.extend_from_slice(data);
    }

    /// The wire encoding of this chunk.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.data.as_ref().map_or(0, |d| d.len() + 4));
        self.write_to(&mut out);
        out
    }

    /// Render this chunk as an assembly token.
    ///
    /// Pushes render as hex, `OP_0` as `0` and `OP_1NEGATE` as `-1`. A
    /// top-level `OP_RETURN` is followed by its trailing data, rendered as
    /// chunks when it parses and as a single hex token otherwise.
    pub fn to_asm_string(&self) -> String {
        match (self.op, &self.data) {
            (OP_0, _) => "0".to_string(),
            (OP_1NEGATE, _) => "-1".to_string(),
            (OP_RETURN, Some(rest)) => {
                let tail = match decode_script(rest) {
                    Ok(chunks) => chunks
                        .iter()
                        .map(ScriptChunk::to_asm_string)
                        .collect::<Vec<_>>()
                        .join(" "),
                    Err(_) => hex::encode(rest),
                };
                format!("OP_RETURN {}", tail)
            }
            (op, Some(data)) if op <= OP_PUSHDATA4 => {
                if data.is_empty() {
                    "0".to_string()
                } else {
                    hex::encode(data)
                }
            }
            (op, _) => opcode_to_string(op),
        }
    }
}

/// Opcode that prefixes a push of `len` bytes in its minimal form, ignoring
/// the small-integer opcodes.
fn minimal_push_opcode(len: usize) -> u8 {
    match len {
        0 => OP_0,
        1..=75 => len as u8,
        76..=0xff => OP_PUSHDATA1,
        0x100..=0xffff => OP_PUSHDATA2,
        _ => OP_PUSHDATA4,
    }
}

/// Decode raw script bytes into chunks.
///
/// Handles direct pushes, `OP_PUSHDATA1/2/4` and `OP_RETURN`, which outside a
/// conditional block swallows the rest of the script as opaque data.
///
/// # Arguments
/// * `bytes` - The raw script bytes to decode.
///
/// # Returns
/// The parsed chunks, or `ScriptError::TruncatedPush` if a push runs past the
/// end of the script.
pub fn decode_script(bytes: &[u8]) -> Result<Vec<ScriptChunk>, ScriptError> {
    let mut chunks = Vec::new();
    let mut pos = 0;
    let mut depth: usize = 0;

    while pos < bytes.len() {
        let op = bytes[pos];
        let start = pos;
        pos += 1;

        let (len_bytes, data_len) = match op {
            OP_IF | OP_NOTIF | OP_VERIF | OP_VERNOTIF => {
                depth += 1;
                chunks.push(ScriptChunk::opcode(op));
                continue;
            }
            OP_ENDIF => {
                depth = depth.saturating_sub(1);
                chunks.push(ScriptChunk::opcode(op));
                continue;
            }
            OP_RETURN if depth == 0 => {
                let rest = &bytes[pos..];
                chunks.push(ScriptChunk {
                    op,
                    data: (!rest.is_empty()).then(|| rest.to_vec()),
                });
                break;
            }
            OP_DATA_1..=OP_DATA_75 => (0, op as usize),
            OP_PUSHDATA1 => (1, read_len(bytes, start, 1)?),
            OP_PUSHDATA2 => (2, read_len(bytes, start, 2)?),
            OP_PUSHDATA4 => (4, read_len(bytes, start, 4)?),
            _ => {
                chunks.push(ScriptChunk::opcode(op));
                continue;
            }
        };

        pos += len_bytes;
        let remaining = bytes.len() - pos;
        if data_len > remaining {
            return Err(ScriptError::TruncatedPush {
                offset: start,
                wanted: data_len,
                remaining,
            });
        }
        chunks.push(ScriptChunk {
            op,
            data: Some(bytes[pos..pos + data_len].to_vec()),
        });
        pos += data_len;
    }

    Ok(chunks)
}

/// Read the little-endian length field of a `PUSHDATAn` opcode at `start`.
fn read_len(bytes: &[u8], start: usize, width: usize) -> Result<usize, ScriptError> {
    let field = bytes
        .get(start + 1..start + 1 + width)
        .ok_or(ScriptError::TruncatedPush {
            offset: start,
            wanted: width,
            remaining: bytes.len() - start - 1,
        })?;
    Ok(field
        .iter()
        .rev()
        .fold(0usize, |acc, b| (acc << 8) | *b as usize))
}

/// Length prefix for a push of `data_len` bytes.
///
/// Unlike [`ScriptChunk::push`] this never substitutes the small-integer
/// opcodes, so the result is always a length prefix.
pub fn push_data_prefix(data_len: usize) -> Result<Vec<u8>, ScriptError> {
    let op = minimal_push_opcode(data_len);
    Ok(match op {
        OP_0 => vec![OP_0],
        OP_PUSHDATA1 => vec![op, data_len as u8],
        OP_PUSHDATA2 => {
            let mut v = vec![op];
            v.extend_from_slice(&(data_len as u16).to_le_bytes());
            v
        }
        OP_PUSHDATA4 => {
            let len = u32::try_from(data_len).map_err(|_| ScriptError::DataTooBig(data_len))?;
            let mut v = vec![op];
            v.extend_from_slice(&len.to_le_bytes());
            v
        }
        _ => vec![op],
    })
}
