//! Frame-tick delayed continuations.

use crate::host::CharacterAddress;

/// Continuation resumed once its tick delay has elapsed.
pub type Continuation<C> = Box<dyn FnOnce(&mut C, CharacterAddress)>;

pub struct ScheduledTask<C> {
    pub character: CharacterAddress,
    remaining_ticks: u32,
    run: Continuation<C>,
}

impl<C> ScheduledTask<C> {
    pub fn run(self, context: &mut C) {
        (self.run)(context, self.character);
    }
}

/// Queue of continuations keyed by the number of frame ticks left.
///
/// Tasks are released in the order they were scheduled when several fall due
/// on the same tick.
pub struct TickScheduler<C> {
    tasks: Vec<ScheduledTask<C>>,
}

impl<C> TickScheduler<C> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Queues `run` to resume after `ticks` calls to [`advance`](Self::advance).
    /// A delay of zero resumes on the next advance.
    pub fn schedule(&mut self, character: CharacterAddress, ticks: u32, run: Continuation<C>) {
        self.tasks.push(ScheduledTask {
            character,
            remaining_ticks: ticks.max(1),
            run,
        });
    }

    /// Counts one frame tick down and hands back every task that fell due.
    pub fn advance(&mut self) -> Vec<ScheduledTask<C>> {
        let mut due = Vec::new();
        let mut waiting = Vec::with_capacity(self.tasks.len());
        for mut task in self.tasks.drain(..) {
            task.remaining_ticks -= 1;
            if task.remaining_ticks == 0 {
                due.push(task);
            } else {
                waiting.push(task);
            }
        }
        self.tasks = waiting;
        due
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn pending_for(&self, character: CharacterAddress) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.character == character)
            .count()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

impl<C> Default for TickScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}
