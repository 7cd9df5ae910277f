//! Async consumer example: dispatch on a plain thread, consume in tokio.
//!
//! Run with:
//!   cargo run --example async-consumer --features async

use std::sync::Arc;
use std::thread;

use canrx::engine::channel_handler;
use canrx::frame::{EFF_FLAG, EFF_MASK, EFF_RTR_FLAGS};
use canrx::{CanId, Engine, Filter, Frame, InterfaceId, StaticDevices};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let can0 = InterfaceId(1);
    let engine = Arc::new(Engine::new(Arc::new(StaticDevices::with_can([can0]))));
    engine.on_interface_attach(can0)?;

    let (handler, mut rx) = channel_handler(64);
    let filter = Filter::new(EFF_FLAG | 0x18FE_F100, EFF_MASK | EFF_RTR_FLAGS);
    engine.register(Some(can0), filter, handler.clone(), "j1939-ccvs")?;

    let producer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || -> Result<(), canrx::frame::FrameError> {
            for speed in 0u8..5 {
                let frame = Frame::new(CanId::extended(0x18FE_F100), &[0, speed, 0, 0])?;
                engine.dispatch(can0, &frame);
            }
            let other = Frame::new(CanId::extended(0x18FE_F200), &[])?;
            engine.dispatch(can0, &other);
            Ok(())
        })
    };

    for _ in 0..5 {
        if let Some(frame) = rx.recv().await {
            println!("{frame}");
        }
    }

    producer.join().map_err(|_| "producer panicked")??;
    println!("dropped: {}", handler.dropped());
    Ok(())
}
