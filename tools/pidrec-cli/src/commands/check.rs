//! Check system capabilities.

use pidrec_platform_core::DisplayServer;
use pidrec_platform_linux::{detect_display_server, detect_monitors, list_windows};

pub fn run() -> anyhow::Result<()> {
    println!("pidrec System Check");
    println!("{}", "=".repeat(50));

    match detect_display_server() {
        DisplayServer::X11 => println!("[OK] Display server: X11"),
        DisplayServer::Wayland => {
            println!("[WARN] Display server: Wayland (window capture by PID needs X11)")
        }
        DisplayServer::Unknown => println!("[WARN] Display server: Unknown"),
    }

    match detect_monitors() {
        Ok(monitors) => {
            println!("[OK] Monitors detected: {}", monitors.len());
            for m in &monitors {
                println!(
                    "     {} {}x{}+{}+{} @ {}Hz {}",
                    m.name,
                    m.width,
                    m.height,
                    m.x,
                    m.y,
                    m.refresh_rate_hz,
                    if m.primary { "(primary)" } else { "" }
                );
            }
        }
        Err(e) => println!("[WARN] Monitor detection failed: {e}"),
    }

    match list_windows() {
        Ok(windows) => {
            let visible = windows.iter().filter(|w| w.on_screen).count();
            println!("[OK] Windows: {} ({visible} on screen)", windows.len());
        }
        Err(e) => println!("[WARN] Window enumeration failed: {e}"),
    }

    let capabilities = pidrec_platform_linux::permissions::check_capabilities();
    println!();
    pidrec_platform_linux::permissions::print_capability_report(&capabilities);

    let all_required_ok = capabilities
        .iter()
        .filter(|c| c.required)
        .all(|c| c.available);

    println!();
    if all_required_ok {
        println!("All required capabilities are available. pidrec is ready.");
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}
