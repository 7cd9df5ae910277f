//! Fan-out example: several receivers on one bus, plus a global catch-all.
//!
//! Run with:
//!   cargo run --example fan-out

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use canrx::engine::DeviceKind;
use canrx::frame::{error_class, SFF_MASK};
use canrx::{CanId, Engine, Filter, Frame, FrameHandler, InterfaceId, StaticDevices};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let can0 = InterfaceId(1);
    let can1 = InterfaceId(2);
    let devices = Arc::new(StaticDevices::new());
    devices.insert(can0, DeviceKind::Can);
    devices.insert(can1, DeviceKind::Can);

    let engine = Arc::new(Engine::new(devices));
    engine.on_interface_attach(can0)?;
    engine.on_interface_attach(can1)?;

    let engine_speed: Arc<dyn FrameHandler> = Arc::new(|frame: &Frame| {
        eprintln!("[engine-speed] {frame}");
    });
    let bus_errors: Arc<dyn FrameHandler> = Arc::new(|frame: &Frame| {
        eprintln!("[bus-errors] {frame}");
    });
    let seen = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&seen);
    let everything: Arc<dyn FrameHandler> = Arc::new(move |_: &Frame| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    let speed_filter = Filter::new(0x0C0, SFF_MASK);
    engine.register(Some(can0), speed_filter, Arc::clone(&engine_speed), "engine-speed")?;
    engine.register(None, Filter::error(error_class::BUS_OFF), bus_errors, "bus-errors")?;
    engine.register(None, Filter::all(), everything, "monitor")?;

    // one receive thread per bus
    let workers: Vec<_> = [can0, can1]
        .into_iter()
        .map(|bus| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || -> Result<u32, canrx::frame::FrameError> {
                let mut matches = 0;
                for id in 0x0BE..0x0C2 {
                    let frame = Frame::new(CanId::standard(id), &[0x12, 0x34])?;
                    matches += engine.dispatch(bus, &frame);
                }
                let bus_off = Frame::error(error_class::BUS_OFF, &[])?;
                matches += engine.dispatch(bus, &bus_off);
                Ok(matches)
            })
        })
        .collect();

    for worker in workers {
        let matches = worker.join().map_err(|_| "receive thread panicked")??;
        eprintln!("[main] bus done, {matches} deliveries");
    }

    engine.unregister(Some(can0), speed_filter, &engine_speed)?;
    engine.on_interface_detach(can0);
    engine.on_interface_detach(can1);

    let stats = engine.stats();
    eprintln!(
        "[main] monitor saw {} frames; engine: {} frames, {} deliveries",
        seen.load(Ordering::Relaxed),
        stats.rx_frames,
        stats.matches
    );
    Ok(())
}
