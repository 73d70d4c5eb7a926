mod prelude;

pub(crate) use self::prelude::{error_stage, error_type};

pub(crate) trait InternalEvent: Sized {
    fn emit(self);
}

pub(crate) fn emit(event: impl InternalEvent) {
    event.emit();
}

macro_rules! emit {
    ($event:expr) => {
        $crate::internal_events::emit($event)
    };
}

// Modules that require emit! macro so they need to be defined after the macro.
mod avro_codec;
mod http_client;
mod schema_registry;

pub(crate) use self::avro_codec::*;
pub(crate) use self::http_client::*;
pub(crate) use self::schema_registry::*;
