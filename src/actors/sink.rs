//! Sinks: Null, Dump, SetStorageValue, Console

use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::actors::storage_name;
use crate::engine::actor::Sink;
use crate::engine::context::ActorContext;
use crate::engine::factory::ActorFactory;
use crate::engine::token::{payload_to_string, Token};
use crate::engine::tree::ActorKind;
use crate::error::{FlowError, FlowResult};

/// Register sink actors
pub fn register(factory: &ActorFactory) {
    factory.register("Null", || ActorKind::Sink(Box::new(Null)));
    factory.register("Dump", || ActorKind::Sink(Box::new(Dump::default())));
    factory.register("SetStorageValue", || ActorKind::Sink(Box::new(SetStorageValue)));
    factory.register("Console", || ActorKind::Sink(Box::new(Console)));
}

/// Discards every token
#[derive(Debug, Default, Clone, Copy)]
pub struct Null;

impl Sink for Null {
    fn consume(&mut self, _token: Token, _ctx: &ActorContext<'_>) -> FlowResult<()> {
        Ok(())
    }
}

/// Writes payloads to the text file named by option `file`, one per line.
///
/// Array payloads are written one element per line. Unless `append` is
/// set, a file is truncated by the first write of a run; later tokens of
/// the same run are appended.
#[derive(Debug, Default)]
pub struct Dump {
    written: HashSet<PathBuf>,
}

impl Dump {
    fn lines(payload: &JsonValue) -> Vec<String> {
        match payload {
            JsonValue::Array(items) => items.iter().map(payload_to_string).collect(),
            other => vec![payload_to_string(other)],
        }
    }

    fn open(&mut self, path: &Path, append: bool) -> FlowResult<fs::File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let first_write = self.written.insert(path.to_path_buf());
        let truncate = first_write && !append;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(!truncate)
            .truncate(truncate)
            .open(path)
            .map_err(|e| FlowError::runtime(format!("cannot write '{}': {}", path.display(), e)))?;
        Ok(file)
    }
}

impl Sink for Dump {
    fn set_up(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        if !ctx.has_option("file") {
            return Err(FlowError::invalid_option("file", "option is required"));
        }
        Ok(())
    }

    fn consume(&mut self, token: Token, ctx: &ActorContext<'_>) -> FlowResult<()> {
        let path = PathBuf::from(ctx.required_str("file")?);
        let append = ctx.option_bool("append")?.unwrap_or(false);

        let mut file = self.open(&path, append)?;
        let mut content = String::new();
        for line in Self::lines(token.payload()) {
            content.push_str(&line);
            content.push('\n');
        }
        file.write_all(content.as_bytes())?;
        tracing::trace!(actor = ctx.path(), file = %path.display(), bytes = content.len(), "dumped");
        Ok(())
    }

    fn clean_up(&mut self) {
        self.written.clear();
    }
}

/// Stores the payload under `storage_name`, in `cache` if given
#[derive(Debug, Default, Clone, Copy)]
pub struct SetStorageValue;

impl Sink for SetStorageValue {
    fn set_up(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        if !ctx.has_option("storage_name") {
            return Err(FlowError::invalid_option("storage_name", "option is required"));
        }
        Ok(())
    }

    fn consume(&mut self, token: Token, ctx: &ActorContext<'_>) -> FlowResult<()> {
        let name = storage_name(ctx, "storage_name", None)?;
        match ctx.option_str("cache")? {
            Some(cache) => {
                if !ctx.storage().set_in_cache(&cache, &name, token.into_payload()) {
                    return Err(FlowError::runtime(format!("unknown cache '{}'", cache)));
                }
            }
            None => {
                ctx.storage().set(&name, token.into_payload());
            }
        }
        Ok(())
    }
}

/// Prints payloads to stdout, optionally prefixed with option `prefix`
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

impl Sink for Console {
    fn consume(&mut self, token: Token, ctx: &ActorContext<'_>) -> FlowResult<()> {
        let prefix = ctx.option_str("prefix")?.unwrap_or_default();
        println!("{}{}", prefix, token.payload_string());
        Ok(())
    }
}
