//! Command dispatch.
//!
//! The [`Dispatcher`] sits between the codec and the store: it takes one
//! decoded request value, resolves the command name against the
//! [`CommandTable`], invokes the handler with the already-split argument
//! list, and returns the reply value. [`Dispatcher::handle_frame`] is the
//! byte-in/byte-out entry point the connection layer drives — one complete
//! input frame per call, one serialized reply back.
//!
//! Nothing in here is fatal: a malformed frame, an unknown command or a bad
//! argument shape each become a RESP error reply scoped to that one
//! command. Whether to keep the connection open afterwards is the
//! connection handler's call, not ours.

use crate::commands::CommandTable;
use crate::protocol::{parse_frame, RespValue};
use crate::storage::Store;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace};

/// Resolves decoded requests to command handlers and produces replies.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    table: Arc<CommandTable>,
    store: Arc<Store>,
}

impl Dispatcher {
    /// Creates a dispatcher over the shared store with the built-in
    /// command table.
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            table: Arc::new(CommandTable::builtin()),
            store,
        }
    }

    /// Executes one decoded request and returns the reply value.
    ///
    /// Arrays are command invocations (`[name, arg1, ..., argN]`); a bare
    /// simple string is the degenerate no-argument form, so `+PING\r\n`
    /// works without an array wrapper.
    pub fn dispatch(&self, request: RespValue) -> RespValue {
        match request {
            RespValue::Array(elements) => self.dispatch_array(elements),
            RespValue::SimpleString(name) => self.invoke(name.trim(), &[]),
            other => {
                debug!(request = %other, "rejected non-command request");
                RespValue::error("ERR invalid command format")
            }
        }
    }

    /// Decodes one complete frame from `raw`, dispatches it, and returns
    /// the serialized reply. Protocol errors become RESP error replies.
    pub fn handle_frame(&self, raw: &[u8]) -> Bytes {
        let reply = match parse_frame(raw) {
            Ok(Some((request, _consumed))) => self.dispatch(request),
            Ok(None) => RespValue::error("ERR protocol error: incomplete frame"),
            Err(e) => RespValue::error(format!("ERR protocol error: {}", e)),
        };
        Bytes::from(reply.serialize())
    }

    fn dispatch_array(&self, elements: Vec<RespValue>) -> RespValue {
        let Some((head, tail)) = elements.split_first() else {
            return RespValue::error("ERR empty command");
        };

        let Some(name) = head.as_str() else {
            return RespValue::error("ERR invalid command name");
        };

        // Arguments stay individually split; handlers never re-parse them.
        let mut args = Vec::with_capacity(tail.len());
        for element in tail {
            match element {
                RespValue::BulkString(b) => args.push(b.clone()),
                RespValue::SimpleString(s) => args.push(Bytes::from(s.clone())),
                _ => return RespValue::error("ERR invalid argument type"),
            }
        }

        self.invoke(name, &args)
    }

    /// Two-step lookup: niladic first (arguments ignored), then variadic.
    fn invoke(&self, name: &str, args: &[Bytes]) -> RespValue {
        let lowered = name.to_ascii_lowercase();

        if let Some(handler) = self.table.niladic(&lowered) {
            trace!(command = %lowered, "niladic command");
            return handler();
        }

        if let Some(handler) = self.table.variadic(&lowered) {
            trace!(command = %lowered, argc = args.len(), "variadic command");
            return handler(&self.store, args);
        }

        debug!(command = %name, "unknown command");
        RespValue::error(format!("ERR unknown command '{}'", name))
    }
}
