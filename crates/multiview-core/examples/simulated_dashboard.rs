//! Simulated dashboard example
//!
//! Mounts the six local streams on simulated engines, lets one of them run
//! slow and shows the follower being pulled back to the leader.
//!
//! Run with: cargo run -p multiview-core --example simulated_dashboard

use multiview_core::{
    Dashboard, DashboardConfig, PlaybackEngine, SimulatedEngine, SimulationProfile, StaticCatalog,
    StreamDescriptor,
};
use std::cell::RefCell;
use std::rc::Rc;

fn main() -> multiview_core::Result<()> {
    println!("Multiview Core - Simulated Dashboard Example");
    println!("============================================\n");

    let streams = Rc::new(RefCell::new(Vec::new()));
    let registry = Rc::clone(&streams);
    let factory = move |descriptor: &StreamDescriptor| -> Box<dyn PlaybackEngine> {
        let profile = SimulationProfile {
            // Stream 4 plays 15% slow
            rate: if descriptor.id == 4 { 0.85 } else { 1.0 },
            ..Default::default()
        };
        let engine = SimulatedEngine::new(profile);
        registry.borrow_mut().push(engine.stream());
        Box::new(engine)
    };

    let mut dash = Dashboard::new(DashboardConfig::default(), factory)?;
    let attached = dash.mount(StaticCatalog::local().streams().to_vec());
    println!("Mounted {attached} streams, leader: stream {:?}\n", dash.snapshot().leader_stream);

    let report = dash.play_all();
    println!("Play all: {}/{} started\n", report.succeeded(), report.attempted);

    for second in 1..=20 {
        for _ in 0..4 {
            for stream in streams.borrow().iter() {
                stream.tick(0.25);
            }
            dash.drain();
        }

        if second % 5 == 0 {
            let snapshot = dash.snapshot();
            println!("t={second:>2}s  leader={:.2}", snapshot.leader_position);
            for session in &snapshot.sessions {
                println!(
                    "   {:<22} {:<8} pos={:>6.2} drift={:<6} corrections={}",
                    session.name,
                    session.role.to_string(),
                    session.position,
                    session
                        .drift
                        .map(|d| format!("{d:.2}"))
                        .unwrap_or_else(|| "-".to_string()),
                    session.stats.as_ref().map(|s| s.corrections).unwrap_or(0),
                );
            }
            println!();
        }
    }

    let snapshot = dash.snapshot();
    println!("Total corrections: {}", snapshot.total_corrections());

    dash.pause_all();
    dash.unmount();
    println!("Unmounted");

    Ok(())
}
