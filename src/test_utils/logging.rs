use std::time::Instant;

/// Banner-style progress output for long integration scenarios.
///
/// Creating one also routes `tracing` output from the crate to the test
/// writer so install steps show up under `--nocapture`.
pub struct TestLogger {
    test_name: String,
    start_time: Instant,
    step: std::cell::Cell<usize>,
}

impl TestLogger {
    pub fn new(test_name: &str) -> Self {
        crate::logging::init_for_tests();
        let separator = "=".repeat(60);
        println!("\n{separator}");
        println!("[TEST START] {test_name}");
        println!("{separator}");
        Self {
            test_name: test_name.to_string(),
            start_time: Instant::now(),
            step: std::cell::Cell::new(0),
        }
    }

    /// Announce the next numbered step of the scenario.
    pub fn step(&self, description: &str) {
        let n = self.step.get() + 1;
        self.step.set(n);
        println!("[STEP {n}] {description}");
    }

    pub fn log_input<T: std::fmt::Debug>(&self, name: &str, value: &T) {
        println!("[INPUT] {name}: {value:?}");
    }

    pub fn log_actual<T: std::fmt::Debug>(&self, value: &T) {
        println!("[ACTUAL] {value:?}");
    }

    pub fn pass(&self) {
        println!(
            "[RESULT] {} PASSED in {:?} ({} steps)",
            self.test_name,
            self.start_time.elapsed(),
            self.step.get()
        );
        println!("{}\n", "=".repeat(60));
    }
}
