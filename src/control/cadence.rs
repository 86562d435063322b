/// Modulo counter that fires once every `every` ticks.
#[derive(Debug, Clone)]
pub struct Decimator {
    every: u32,
    count: u32,
}

impl Decimator {
    pub fn new(every: u32) -> Self {
        Decimator {
            every: every.max(1),
            count: 0,
        }
    }

    /// Advance one tick; true when the counter wraps to zero.
    pub fn tick(&mut self) -> bool {
        self.count = (self.count + 1) % self.every;
        self.count == 0
    }

    #[cfg(test)]
    pub fn count(&self) -> u32 {
        self.count
    }
}
