#![no_main]

use cachetx::environment::ServiceEnvironment;
use cachetx::resolver::TransactionConfigResolver;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (&str, &str, i64)| {
    let (mode, locking, stop_timeout_ms) = input;
    let resolver = TransactionConfigResolver::new("fuzz");

    if let Ok(request) = resolver.configure(mode, locking, stop_timeout_ms) {
        assert!(stop_timeout_ms >= 0);
        let _ = resolver.resolve_with(&request, &ServiceEnvironment::new());
    }
});
