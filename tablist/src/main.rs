use clap::Parser;
use log::{error, info, warn};
use shared::{Layout, LayoutEntry, TabView, OVERLAY_SLOTS};
use std::collections::HashMap;
use std::sync::Arc;
use tablist::host::{Revision, SimulatedHost};
use tablist::overlay::OverlayManager;
use tablist::PassReport;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Protocol revision of the simulated server (v1_7_R4 or v1_8_R3)
    #[arg(short, long, default_value = "v1_8_R3")]
    revision: Revision,

    /// Number of viewers to connect
    #[arg(short, long, default_value = "3")]
    viewers: usize,

    /// JSON file holding the layout to apply after showing
    #[arg(short, long)]
    layout: Option<std::path::PathBuf>,

    /// Name prefix for the simulated participants
    #[arg(short, long, default_value = "Player")]
    participant_prefix: String,
}

/// Connects the viewers, shows the overlay to all of them at once, applies a
/// layout, hides it again and prints what each viewer ended up seeing.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let layout = match &args.layout {
        Some(path) => {
            let layout: Layout = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            layout.validate()?;
            layout
        }
        None => demo_layout()?,
    };

    info!("Starting simulated {} server", args.revision);
    let host = Arc::new(SimulatedHost::new(args.revision));
    let synth = tablist::registry::init(host.as_ref()).map_err(|e| {
        error!("Cannot run the overlay on {}: {}", args.revision, e);
        e
    })?;

    let mut frames: HashMap<Uuid, (String, UnboundedReceiver<Vec<u8>>)> = HashMap::new();
    let mut sessions = Vec::new();
    for i in 0..args.viewers {
        let (session, rx) = host.connect(&format!("{}{}", args.participant_prefix, i + 1));
        frames.insert(session.id, (session.name.clone(), rx));
        sessions.push(session);
    }

    let manager = Arc::new(OverlayManager::new(host.clone(), synth));
    for session in &sessions {
        manager.attach(session.clone()).await;
    }

    // Every viewer first sees the real participants, as on join
    let mut views: HashMap<Uuid, TabView> = HashMap::new();
    for viewer in &sessions {
        let packet = manager
            .synthesizer()
            .real_packet(shared::PlayerInfoAction::AddPlayer, &sessions)?;
        manager.synthesizer().send_to(viewer, &packet)?;
        views.insert(viewer.id, TabView::new());
    }

    let mut tasks = Vec::new();
    for session in &sessions {
        let manager = Arc::clone(&manager);
        let id = session.id;
        tasks.push(tokio::spawn(async move { manager.show(id).await }));
    }
    let mut total = PassReport::default();
    for task in tasks {
        total.merge(task.await??);
    }
    info!(
        "Showed overlay to {} viewers ({} packets)",
        sessions.len(),
        total.sent
    );

    for session in &sessions {
        let report = manager.apply_layout(session.id, layout.clone()).await?;
        if !report.is_clean() {
            warn!("{} layout updates failed for {}", report.failures.len(), session.name);
        }
    }

    drain(&mut frames, &mut views);
    println!("While shown:");
    print_views(&frames, &views);

    for session in &sessions {
        manager.hide(session.id).await?;
    }
    drain(&mut frames, &mut views);
    println!("After hiding:");
    print_views(&frames, &views);

    Ok(())
}

fn demo_layout() -> Result<Layout, shared::LayoutError> {
    let mut layout = Layout::new()
        .with_header("Overlay demo")
        .with_footer("80 slots");
    for x in 0..shared::COLUMNS {
        layout.set_at(x, 0, LayoutEntry::new(format!("Column {}", x + 1)))?;
    }
    layout.set_slot(OVERLAY_SLOTS - 1, LayoutEntry::new("Last slot").with_ping(150))?;
    Ok(layout)
}

fn drain(
    frames: &mut HashMap<Uuid, (String, UnboundedReceiver<Vec<u8>>)>,
    views: &mut HashMap<Uuid, TabView>,
) {
    for (id, (name, rx)) in frames.iter_mut() {
        let Some(view) = views.get_mut(id) else {
            continue;
        };
        while let Ok(frame) = rx.try_recv() {
            if let Err(e) = view.apply_frame(&frame) {
                warn!("Dropping undecodable frame for {}: {}", name, e);
            }
        }
    }
}

fn print_views(
    frames: &HashMap<Uuid, (String, UnboundedReceiver<Vec<u8>>)>,
    views: &HashMap<Uuid, TabView>,
) {
    for (id, view) in views {
        let name = frames.get(id).map(|(name, _)| name.as_str()).unwrap_or("?");
        println!(
            "  {}: {} entries ({} synthetic), real: {:?}, header: {:?}, footer: {:?}",
            name,
            view.len(),
            view.synthetic_count(),
            view.real_names(),
            view.header,
            view.footer
        );
        if let Some(entry) = view.slot(0) {
            println!("    slot 0 shows {:?}", entry.display_name);
        }
    }
}
