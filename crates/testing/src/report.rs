//! Result aggregation types for the CLI test-runner binary, and the small
//! set of runtime checks it drives directly (as opposed to the `#[test]`
//! scenarios in `correctness`/`property_based`, which only `cargo test`
//! can run).

use anyhow::{anyhow, Result};
use sis_kernel::process::resource::{ResourceEnforcer, ResourceLimits};
use sis_kernel::process::{Priority, ProcessManager, ProcessState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TestCategory {
    Process,
    Network,
    Terminal,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TestRecord {
    pub name: String,
    pub category: TestCategory,
    pub passed: bool,
    pub detail: String,
}

impl TestRecord {
    fn ok(name: &str, category: TestCategory) -> Self {
        Self {
            name: name.to_string(),
            category,
            passed: true,
            detail: "ok".to_string(),
        }
    }

    fn fail(name: &str, category: TestCategory, err: &anyhow::Error) -> Self {
        Self {
            name: name.to_string(),
            category,
            passed: false,
            detail: err.to_string(),
        }
    }
}

async fn check_process_lifecycle() -> Result<()> {
    let manager = ProcessManager::new();
    let pid = manager.create(0, "probe", Priority::Normal, ResourceLimits::default()).await;
    manager.start(pid).await?;
    manager.block(pid).await?;
    manager.wake(pid).await?;
    let state = manager.get(pid).await.ok_or_else(|| anyhow!("process vanished"))?.state;
    if state != ProcessState::Ready {
        return Err(anyhow!("expected Ready after wake, got {:?}", state));
    }
    manager.terminate(pid, 0).await?;
    Ok(())
}

fn check_resource_enforcement_order() -> Result<()> {
    let mut enforcer = ResourceEnforcer::new();
    enforcer.register(
        1,
        ResourceLimits {
            cpu_ms: 1,
            memory_bytes: 1,
            files: 0,
            stack_bytes: 0,
            ..Default::default()
        },
    );
    let _ = enforcer.add_cpu(1, 1);
    let _ = enforcer.update_memory(1, 1);
    match enforcer.check_all(1) {
        Err(sis_kernel::error::ProcessError::LimitExceeded {
            kind: sis_kernel::error::ResourceKind::Cpu,
            ..
        }) => Ok(()),
        Err(other) => Err(anyhow!("expected Cpu violation first, got {other}")),
        Ok(()) => Err(anyhow!("expected a violation, got none")),
    }
}

fn check_ipv4_roundtrip() -> Result<()> {
    use sis_kernel::net::ipv4::{fragment, reassemble, Ipv4Datagram, Ipv4Header};
    use std::net::Ipv4Addr;

    let header = Ipv4Header {
        version: 4,
        ihl: 5,
        tos: 0,
        total_length: 0,
        identification: 99,
        flags: 0,
        fragment_offset: 0,
        ttl: 64,
        protocol: 17,
        checksum: 0,
        source: Ipv4Addr::new(10, 0, 0, 1),
        destination: Ipv4Addr::new(10, 0, 0, 2),
        options: Vec::new(),
    };
    let datagram = Ipv4Datagram {
        header,
        payload: vec![0x42; 3000],
    };
    let fragments = fragment(&datagram, 1500)?;
    let reassembled = reassemble(&fragments)?;
    if reassembled.payload != datagram.payload {
        return Err(anyhow!("reassembled payload does not match original"));
    }
    Ok(())
}

fn check_terminal_ansi_dispatch() -> Result<()> {
    use sis_kernel::term::{AnsiParser, Terminal};

    let mut term = Terminal::new(10, 5, 20);
    let mut parser = AnsiParser::new();
    parser.feed(&mut term, b"\x1b[1;1Hready");
    let cell = term
        .screen
        .get_cell(0, 0)
        .ok_or_else(|| anyhow!("cursor-positioned write landed out of bounds"))?;
    if cell.ch != 'r' {
        return Err(anyhow!("expected 'r' at (0,0), got {:?}", cell.ch));
    }
    Ok(())
}

/// Run the full set of direct runtime checks, returning one record per
/// check regardless of outcome.
pub async fn run_all() -> Vec<TestRecord> {
    let mut records = Vec::new();

    records.push(match check_process_lifecycle().await {
        Ok(()) => TestRecord::ok("process_lifecycle", TestCategory::Process),
        Err(e) => TestRecord::fail("process_lifecycle", TestCategory::Process, &e),
    });

    records.push(match check_resource_enforcement_order() {
        Ok(()) => TestRecord::ok("resource_enforcement_order", TestCategory::Process),
        Err(e) => TestRecord::fail("resource_enforcement_order", TestCategory::Process, &e),
    });

    records.push(match check_ipv4_roundtrip() {
        Ok(()) => TestRecord::ok("ipv4_fragment_roundtrip", TestCategory::Network),
        Err(e) => TestRecord::fail("ipv4_fragment_roundtrip", TestCategory::Network, &e),
    });

    records.push(match check_terminal_ansi_dispatch() {
        Ok(()) => TestRecord::ok("ansi_cursor_dispatch", TestCategory::Terminal),
        Err(e) => TestRecord::fail("ansi_cursor_dispatch", TestCategory::Terminal, &e),
    });

    records
}
