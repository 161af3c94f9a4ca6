//! Handler table keyed by message command, populated with default
//! handlers at construction and overridable by application code.
//!
//! This stands in for the source's function-pointer-in-struct façade:
//! instead of mutable fields holding handler pointers, handlers live in
//! a map from command name to boxed closure, and the session owns the
//! mutable state they operate on.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::codec::Message;
use crate::error::Result;

use super::session::SessionState;

pub type Handler = Box<dyn FnMut(&mut SessionState, Message) -> Result<()> + Send>;

pub struct HandlerTable {
    handlers: HashMap<&'static str, Handler>,
}

impl HandlerTable {
    /// Build the table with the default handler for every known message
    /// variant. `command()` on `Message` is the table key.
    pub fn with_defaults() -> Self {
        let mut handlers: HashMap<&'static str, Handler> = HashMap::new();

        handlers.insert("version", Box::new(|state, msg| state.on_version(msg)));
        handlers.insert("verack", Box::new(|state, msg| state.on_verack(msg)));
        handlers.insert("headers", Box::new(|state, msg| state.on_headers(msg)));
        handlers.insert("ping", Box::new(|state, msg| state.on_ping(msg)));
        handlers.insert("pong", Box::new(|_state, _msg| Ok(())));
        handlers.insert("sendheaders", Box::new(|state, _msg| {
            state.send_headers = true;
            Ok(())
        }));
        handlers.insert("reject", Box::new(|_state, msg| {
            if let Message::Reject(r) = msg {
                warn!(message = %r.message, code = r.code, reason = %r.reason, "peer rejected a message");
            }
            Ok(())
        }));

        HandlerTable { handlers }
    }

    /// Install or replace the handler for a given command.
    pub fn install(&mut self, command: &'static str, handler: Handler) {
        self.handlers.insert(command, handler);
    }

    /// Dispatch one inbound message. Unregistered commands (addr, inv,
    /// getdata, tx, block, and the rest of the variants this node never
    /// acts on) are logged and dropped, matching the "default handler is
    /// a no-op" contract every known variant gets per the spec.
    pub fn dispatch(&mut self, state: &mut SessionState, msg: Message) -> Result<()> {
        let command = msg.command();
        match self.handlers.get_mut(command) {
            Some(handler) => handler(state, msg),
            None => {
                debug!(command, "no handler installed, message dropped");
                Ok(())
            }
        }
    }
}
