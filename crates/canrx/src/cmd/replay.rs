use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use canrx_core::{DeviceKind, Engine, FrameHandler, InterfaceId, ReceiverHandle, StaticDevices};
use canrx_frame::candump::{parse_log_line, LogRecord};
use canrx_frame::{Filter, Frame, FrameReader};
use tracing::{debug, info};

use crate::cmd::ReplayArgs;
use crate::exit::{frame_error, io_error, registry_error, CliError, CliResult, SUCCESS};
use crate::output::{print_match, print_summary, OutputFormat, ReceiverRow};

/// Receiver indices hit by the frame being dispatched.
type Hits = Arc<Mutex<Vec<usize>>>;

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let devices = Arc::new(StaticDevices::new());
    let engine = Engine::new(devices.clone());
    let mut interfaces = Interfaces::new(devices);

    let hits: Hits = Arc::new(Mutex::new(Vec::new()));
    let mut receivers = Vec::with_capacity(args.filters.len());
    for (index, spec) in args.filters.iter().enumerate() {
        let (interface, filter) = parse_filter_arg(spec)?;
        let interface = interface.map(|name| interfaces.resolve(&engine, name));

        let sink = Arc::clone(&hits);
        let handler: Arc<dyn FrameHandler> = Arc::new(move |_: &Frame| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(index);
        });
        let handle = engine
            .register(interface, filter, handler, spec.as_str())
            .map_err(|err| registry_error(&format!("register {spec}"), err))?;
        receivers.push(handle);
    }

    let mut source = open_source(&args)?;
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut frames = 0usize;
    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|count| frames >= count) {
            break;
        }
        let Some(record) = source.next_record()? else {
            break;
        };

        let interface = interfaces.resolve(&engine, &record.interface);
        engine.dispatch(interface, &record.frame);
        frames += 1;

        let delivered = std::mem::take(&mut *hits.lock().unwrap_or_else(PoisonError::into_inner));
        for index in delivered {
            print_match(&record, receivers[index].name(), format);
        }
    }
    info!(frames, "replay finished");

    let rows: Vec<ReceiverRow> = receivers
        .iter()
        .map(|handle| ReceiverRow {
            name: handle.name().to_string(),
            interface: interfaces.label(handle.interface()).to_string(),
            filter: handle.filter().to_string(),
            bucket: handle.bucket(),
            matches: handle.matches(),
        })
        .collect();
    print_summary(&rows, engine.stats(), format);

    for handle in &receivers {
        engine
            .unregister_handle(handle)
            .map_err(|err| registry_error(&format!("unregister {}", handle.name()), err))?;
    }
    for interface in engine.interfaces() {
        engine.on_interface_detach(interface);
    }
    engine.shutdown();

    Ok(SUCCESS)
}

/// Split `[IFACE,]SPEC` into its interface name and filter.
fn parse_filter_arg(arg: &str) -> CliResult<(Option<&str>, Filter)> {
    let (interface, spec) = match arg.split_once(',') {
        Some((interface, spec)) => (Some(interface), spec),
        None => (None, arg),
    };
    if interface.is_some_and(str::is_empty) {
        return Err(CliError::new(
            crate::exit::USAGE,
            format!("filter {arg:?}: empty interface name"),
        ));
    }
    let filter = spec
        .parse::<Filter>()
        .map_err(|err| frame_error("filter", err))?;
    Ok((interface, filter))
}

/// Interface names seen so far, numbered from 1 in order of appearance.
struct Interfaces {
    ids: HashMap<String, InterfaceId>,
    names: Vec<String>,
    devices: Arc<StaticDevices>,
}

impl Interfaces {
    fn new(devices: Arc<StaticDevices>) -> Self {
        Self {
            ids: HashMap::new(),
            names: Vec::new(),
            devices,
        }
    }

    /// Look up `name`, attaching it as a CAN interface on first sight.
    fn resolve(&mut self, engine: &Engine, name: &str) -> InterfaceId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }

        let id = InterfaceId(u32::try_from(self.names.len() + 1).unwrap_or(u32::MAX));
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        self.devices.insert(id, DeviceKind::Can);
        debug!(interface = name, %id, "new interface");

        // attach failure leaves the interface to the global receivers
        let _ = engine.on_interface_attach(id);
        id
    }

    fn label(&self, interface: Option<InterfaceId>) -> &str {
        match interface {
            None => "any",
            Some(id) => usize::try_from(id.0)
                .ok()
                .and_then(|n| self.names.get(n.wrapping_sub(1)))
                .map_or("?", String::as_str),
        }
    }
}

enum Source {
    Log {
        lines: io::Lines<Box<dyn BufRead>>,
        line_no: usize,
    },
    Binary {
        reader: FrameReader<Box<dyn BufRead>>,
        bus: String,
    },
}

impl Source {
    fn next_record(&mut self) -> CliResult<Option<LogRecord>> {
        match self {
            Source::Log { lines, line_no } => loop {
                let Some(line) = lines.next() else {
                    return Ok(None);
                };
                *line_no += 1;
                let line = line.map_err(|err| io_error("read failed", err))?;
                match parse_log_line(&line) {
                    Ok(Some(record)) => return Ok(Some(record)),
                    Ok(None) => continue,
                    Err(err) => return Err(frame_error(&format!("line {line_no}"), err)),
                }
            },
            Source::Binary { reader, bus } => {
                let frame = reader
                    .read_frame()
                    .map_err(|err| frame_error("read failed", err))?;
                Ok(frame.map(|frame| LogRecord {
                    timestamp: None,
                    interface: bus.clone(),
                    frame,
                }))
            }
        }
    }
}

fn open_source(args: &ReplayArgs) -> CliResult<Source> {
    let input: Box<dyn BufRead> = match &args.file {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("open {}", path.display()), err))?;
            Box::new(BufReader::new(file))
        }
        _ => Box::new(BufReader::new(io::stdin())),
    };

    if args.binary {
        let bus = args.bus.clone().unwrap_or_else(|| "can0".to_string());
        Ok(Source::Binary {
            reader: FrameReader::new(input),
            bus,
        })
    } else {
        Ok(Source::Log {
            lines: input.lines(),
            line_no: 0,
        })
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use canrx_frame::{EFF_FLAG, SFF_MASK};

    use super::*;

    #[test]
    fn filter_arg_with_interface() {
        let (interface, filter) = parse_filter_arg("can1,123:7FF").unwrap();
        assert_eq!(interface, Some("can1"));
        assert_eq!(filter, Filter::new(0x123, SFF_MASK));
    }

    #[test]
    fn filter_arg_without_interface_is_global() {
        let (interface, filter) = parse_filter_arg("12345678:1FFFFFFF").unwrap();
        assert_eq!(interface, None);
        assert_eq!(filter.id, EFF_FLAG | 0x1234_5678);
    }

    #[test]
    fn filter_arg_errors() {
        assert_eq!(parse_filter_arg(",123:7FF").unwrap_err().code, crate::exit::USAGE);
        assert_eq!(parse_filter_arg("can0,xyz").unwrap_err().code, crate::exit::USAGE);
    }

    #[test]
    fn interfaces_are_numbered_in_order() {
        let devices = Arc::new(StaticDevices::new());
        let engine = Engine::new(devices.clone());
        let mut interfaces = Interfaces::new(devices);

        let can0 = interfaces.resolve(&engine, "can0");
        let vcan = interfaces.resolve(&engine, "vcan3");
        assert_eq!(can0, InterfaceId(1));
        assert_eq!(vcan, InterfaceId(2));
        assert_eq!(interfaces.resolve(&engine, "can0"), can0);
        assert!(engine.has_registry(vcan));
        assert_eq!(interfaces.label(Some(vcan)), "vcan3");
        assert_eq!(interfaces.label(None), "any");
    }

    #[test]
    fn log_source_skips_comments_and_reports_line() {
        let text = "; header\n(1.000000) can0 123#01\n\ncan0 12G#00\n";
        let input: Box<dyn BufRead> = Box::new(io::Cursor::new(text.as_bytes().to_vec()));
        let mut source = Source::Log {
            lines: input.lines(),
            line_no: 0,
        };

        let record = source.next_record().unwrap().unwrap();
        assert_eq!(record.interface, "can0");
        let err = source.next_record().unwrap_err();
        assert!(err.message.starts_with("line 4"));
    }
}
