use crate::ops::{BridgeHost, TargetAddress};
use crate::snapshot::FieldError;
use crate::value::InstanceId;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::{self, Read, Write};

const FRAME_LEN_BYTES: usize = std::mem::size_of::<u32>();

pub const DEFAULT_MAX_FRAME_BYTES: u32 = 1 << 20;

#[derive(Debug, Serialize, Deserialize)]
pub enum Request {
    GetObject {
        target: TargetAddress,
    },
    SetObject {
        target: TargetAddress,
        fields: serde_json::Map<String, serde_json::Value>,
    },
    ResolveType {
        name: String,
        #[serde(default)]
        constraint: Option<String>,
    },
    ResolvePath {
        path: String,
    },
    UndoLast,
    Shutdown,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum Response {
    Fields {
        fields: serde_json::Value,
    },
    Write {
        success: bool,
        message: String,
        #[serde(default)]
        errors: Vec<FieldError>,
    },
    TypeName {
        name: String,
    },
    Instance {
        #[serde(rename = "instanceId")]
        instance_id: InstanceId,
        path: String,
    },
    Undone {
        message: String,
    },
    Error {
        message: String,
    },
    Closing,
}

/// Handles one request against the host. The second return value is true
/// when the session should close.
pub fn dispatch(host: &mut BridgeHost, request: Request) -> (Response, bool) {
    match request {
        Request::GetObject { target } => match host.read_object(&target) {
            Ok(fields) => (Response::Fields { fields }, false),
            Err(err) => (Response::Error { message: err.to_string() }, false),
        },
        Request::SetObject { target, fields } => {
            let report = host.write_object(&target, &fields);
            (
                Response::Write {
                    success: report.success,
                    message: report.message,
                    errors: report.errors,
                },
                false,
            )
        }
        Request::ResolveType { name, constraint } => {
            match host.resolve_type_name(&name, constraint.as_deref()) {
                Ok(name) => (Response::TypeName { name }, false),
                Err(err) => (Response::Error { message: err.to_string() }, false),
            }
        }
        Request::ResolvePath { path } => match host.scene.resolve_path(&path) {
            Some(instance_id) => (Response::Instance { instance_id, path }, false),
            None => (Response::Error { message: format!("no node at path '{path}'") }, false),
        },
        Request::UndoLast => match host.undo_last() {
            Ok(message) => (Response::Undone { message }, false),
            Err(err) => (Response::Error { message: err.to_string() }, false),
        },
        Request::Shutdown => (Response::Closing, true),
    }
}

pub fn send_frame<W, T>(writer: &mut W, value: &T) -> io::Result<()>
where
    W: Write,
    T: Serialize,
{
    let payload = serde_json::to_vec(value).map_err(to_io_error)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "frame too large"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()
}

pub fn recv_frame<R, T>(reader: &mut R, max_len: u32) -> io::Result<T>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; FRAME_LEN_BYTES];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf);
    if len > max_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds limit of {max_len}"),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    serde_json::from_slice(&payload).map_err(to_io_error)
}

fn to_io_error(err: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

/// Blocking request loop: one frame in, one frame out, until a shutdown
/// request or the peer closes the stream.
pub fn serve<R, W>(
    host: &mut BridgeHost,
    reader: &mut R,
    writer: &mut W,
    max_frame_bytes: u32,
) -> io::Result<()>
where
    R: Read,
    W: Write,
{
    loop {
        let request: Request = match recv_frame(reader, max_frame_bytes) {
            Ok(request) => request,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err),
        };
        let (response, closing) = dispatch(host, request);
        send_frame(writer, &response)?;
        if closing {
            return Ok(());
        }
    }
}
