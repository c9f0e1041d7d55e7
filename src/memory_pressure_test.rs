use std::sync::{Arc, Mutex};

use super::*;

struct Responder {
    hits: Arc<Mutex<u32>>,
}

impl PressureResponder for Responder {
    fn on_memory_pressure(&self) -> Result<()> {
        *self.hits.lock().unwrap() += 1;
        Ok(())
    }
}

#[test]
fn test_register_reaps_dead_weak_refs() {
    let monitor = MemoryPressureMonitor::new(DEFAULT_GROWTH_THRESHOLD_KB);
    {
        let hits = Arc::new(Mutex::new(0));
        let responder: Arc<dyn PressureResponder> = Arc::new(Responder { hits });
        monitor.register(&responder);
        assert_eq!(monitor.registered.lock().unwrap().len(), 1);
    }
    // responder dropped; baseline forced so the next tick attempts an
    // intervention and reaps the dead entry.
    *monitor.baseline_kb.lock().unwrap() = Some(0);
    monitor.tick();
    monitor.registered.lock().unwrap().retain(|r| r.target.upgrade().is_some());
    assert_eq!(monitor.registered.lock().unwrap().len(), 0);
}

#[test]
fn test_first_tick_establishes_baseline_without_intervening() {
    let monitor = MemoryPressureMonitor::new(DEFAULT_GROWTH_THRESHOLD_KB);
    let hits = Arc::new(Mutex::new(0));
    let responder: Arc<dyn PressureResponder> = Arc::new(Responder { hits: Arc::clone(&hits) });
    monitor.register(&responder);

    monitor.tick();
    assert_eq!(*hits.lock().unwrap(), 0);
    assert!(monitor.baseline_kb.lock().unwrap().is_some());
}
