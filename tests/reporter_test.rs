//! End-to-end lifecycle test over a loopback statsd sink.
//!
//! Installs the real exit-hook context, fires its report the way the atexit
//! callback would, and asserts on the actual datagrams received. Lives in
//! its own test binary because the installed context is process-wide.

use std::collections::HashSet;
use std::net::UdpSocket;
use std::path::PathBuf;
use std::time::Duration;

use popcon::{setup_reporter, Distribution, SetupError};

fn make_distribution(name: &str, files: &[&str]) -> Distribution {
    Distribution {
        name: name.to_string(),
        files: files.iter().map(PathBuf::from).collect(),
    }
}

fn set(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_register_then_report_over_udp() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let socket = UdpSocket::bind(("127.0.0.1", 0)).unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let port = socket.local_addr().unwrap().port();

    std::env::set_var("PYTHON_POPCONTEST_STATSD_HOST", "127.0.0.1");
    std::env::set_var("PYTHON_POPCONTEST_STATSD_PORT", port.to_string());
    std::env::set_var("PYTHON_POPCONTEST_STATSD_PREFIX", "python_popcon");

    let provider = vec![
        make_distribution("escapism", &["escapism.py"]),
        make_distribution(
            "statsd",
            &["statsd/__init__.py", "statsd/defaults/__init__.py"],
        ),
    ];

    // Modules loaded "now": test_module and escapism predate registration,
    // statsd.defaults gets imported afterwards.
    let registry = set(&["test_module", "escapism", "statsd.defaults"]);
    let baseline = set(&["test_module", "escapism"]);

    let context = setup_reporter(Some(baseline.clone()), registry, provider.clone()).unwrap();

    // The explicit baseline is stored literally, not the live snapshot.
    assert_eq!(context.baseline(), &baseline);

    // First registration wins; a second is rejected.
    let second = setup_reporter(Some(set(&["other"])), HashSet::<String>::new(), provider);
    assert!(matches!(second, Err(SetupError::AlreadyInstalled)));

    // What the exit callback runs at normal termination.
    context.report_now();

    let mut buf = [0u8; 2048];

    // One batched datagram carrying every per-library increment.
    let len = socket.recv(&mut buf).unwrap();
    assert_eq!(
        std::str::from_utf8(&buf[..len]).unwrap(),
        "python_popcon.library_used.statsd:1|c"
    );

    // Plus one separate top-level reports increment.
    let len = socket.recv(&mut buf).unwrap();
    assert_eq!(
        std::str::from_utf8(&buf[..len]).unwrap(),
        "python_popcon.reports:1|c"
    );
}
