//! Per-frame tick: time, controls, one draw, one re-schedule.


/// Monotonic time source in seconds
pub trait Clock {
    fn now(&self) -> f64;
}


/// Browser `performance.now()` on wasm32, [std::time::Instant] elsewhere
pub struct SystemClock {
    #[cfg(not(target_arch = "wasm32"))]
    start: std::time::Instant,
}
impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            start: std::time::Instant::now(),
        }
    }
}
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}
impl Clock for SystemClock {
    #[cfg(target_arch = "wasm32")]
    fn now(&self) -> f64 {
        crate::utils::get_time_milliseconds() / 1000.0
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}


/// Asks the host for one more frame
pub trait FrameScheduler {
    fn request_animation_frame(&mut self);
}


/// What a tick drives
pub trait FrameTarget {
    /// Advances camera controls. Returns true if the camera moved.
    fn update_controls(&mut self, timing: &FrameTiming) -> bool;

    /// Issues the single draw call of the frame
    fn draw(&mut self);
}


#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTiming {
    /// Seconds since the loop started
    pub elapsed: f64,
    /// Seconds since the previous tick; zero on the first one
    pub delta: f64,
}


pub struct RenderLoop<C: Clock> {
    clock: C,
    start: f64,
    previous: Option<f64>,
    frames: u64,
}
impl<C: Clock> RenderLoop<C> {
    pub fn new(clock: C) -> Self {
        let start = clock.now();
        Self {
            clock,
            start,
            previous: None,
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Runs one frame against `target` and re-registers the next one
    pub fn tick<T, S>(&mut self, target: &mut T, scheduler: &mut S) -> FrameTiming
    where
        T: FrameTarget + ?Sized,
        S: FrameScheduler + ?Sized,
    {
        let elapsed = self.clock.now() - self.start;
        let delta = self.previous.map_or(0.0, |p| elapsed - p);
        self.previous = Some(elapsed);
        let timing = FrameTiming { elapsed, delta };

        target.update_controls(&timing);
        target.draw();
        scheduler.request_animation_frame();

        self.frames += 1;
        timing
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FakeClock<'a>(&'a Cell<f64>);
    impl Clock for FakeClock<'_> {
        fn now(&self) -> f64 {
            self.0.get()
        }
    }

    #[derive(Default)]
    struct Counter {
        updates: u32,
        draws: u32,
        scheduled: u32,
    }
    impl FrameTarget for Counter {
        fn update_controls(&mut self, _: &FrameTiming) -> bool {
            self.updates += 1;
            false
        }
        fn draw(&mut self) {
            self.draws += 1;
        }
    }
    impl FrameScheduler for Counter {
        fn request_animation_frame(&mut self) {
            self.scheduled += 1;
        }
    }

    #[test]
    fn each_tick_draws_once_and_schedules_once() {
        let time = Cell::new(10.0);
        let mut render_loop = RenderLoop::new(FakeClock(&time));
        let mut target = Counter::default();
        let mut scheduler = Counter::default();

        for i in 1..=5 {
            render_loop.tick(&mut target, &mut scheduler);
            assert_eq!(target.draws, i);
            assert_eq!(target.updates, i);
            assert_eq!(scheduler.scheduled, i);
            assert_eq!(scheduler.draws, 0);
        }
        assert_eq!(render_loop.frames(), 5);
    }

    #[test]
    fn timing_is_relative_to_the_first_tick() {
        let time = Cell::new(100.0);
        let mut render_loop = RenderLoop::new(FakeClock(&time));
        let mut target = Counter::default();
        let mut scheduler = Counter::default();

        time.set(100.5);
        let first = render_loop.tick(&mut target, &mut scheduler);
        assert_eq!(first, FrameTiming { elapsed: 0.5, delta: 0.0 });

        time.set(100.75);
        let second = render_loop.tick(&mut target, &mut scheduler);
        assert_eq!(second, FrameTiming { elapsed: 0.75, delta: 0.25 });
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
