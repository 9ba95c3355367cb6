//! Multi-producer command queue drained once per frame by the simulation
//! loop.
//!
//! Script tasks push commands from any thread; the loop thread is the only
//! consumer. `drain_and_execute` snapshots the pending commands before
//! running any of them, so commands enqueued *during* execution (including
//! by the commands themselves) always land in the next frame. That keeps a
//! single frame's work bounded by what was pending when it started.

use crossbeam_channel::{Receiver, Sender};

use crate::future::{Future, Promise};

/// A queued unit of work. Commands either complete `done` synchronously,
/// bind it to another future, or hand it to the world for later completion.
pub trait Command<W>: Send {
    fn execute(self: Box<Self>, world: &mut W, done: Promise<()>);

    /// Short name for trace logging.
    fn name(&self) -> &'static str {
        "command"
    }
}

struct Queued<W> {
    command: Box<dyn Command<W>>,
    done: Promise<()>,
}

/// Cloneable producer handle given to script tasks. Holding a sender does
/// not grant any access to the world.
pub struct CommandSender<W> {
    tx: Sender<Queued<W>>,
}

impl<W> Clone for CommandSender<W> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<W> CommandSender<W> {
    /// Enqueue a command and receive the future tracking its completion.
    pub fn push(&self, command: Box<dyn Command<W>>) -> Future<()> {
        let (done, future) = Promise::new();
        if self.tx.send(Queued { command, done }).is_err() {
            // The loop side is gone; nobody will ever execute this command.
            log::warn!("command queue is closed; dropping command");
            return Future::rejected(crate::future::FutureError::Failed(
                "command queue is closed".into(),
            ));
        }
        future
    }
}

/// The loop-owned queue. Producers get `CommandSender` clones; only the
/// owner can drain.
pub struct CommandQueue<W> {
    tx: Sender<Queued<W>>,
    rx: Receiver<Queued<W>>,
}

impl<W> Default for CommandQueue<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> CommandQueue<W> {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> CommandSender<W> {
        CommandSender {
            tx: self.tx.clone(),
        }
    }

    pub fn push(&self, command: Box<dyn Command<W>>) -> Future<()> {
        self.sender().push(command)
    }

    /// Snapshot the pending commands, then run them in arrival order.
    /// Called exactly once per frame by the simulation loop.
    pub fn drain_and_execute(&self, world: &mut W) {
        let pending: Vec<Queued<W>> = self.rx.try_iter().collect();
        for queued in pending {
            log::trace!("executing command '{}'", queued.command.name());
            queued.command.execute(world, queued.done);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::FutureError;

    #[derive(Default)]
    struct TestWorld {
        log: Vec<String>,
    }

    struct Append(&'static str);

    impl Command<TestWorld> for Append {
        fn execute(self: Box<Self>, world: &mut TestWorld, done: Promise<()>) {
            world.log.push(self.0.to_string());
            done.complete();
        }

        fn name(&self) -> &'static str {
            "append"
        }
    }

    /// A command that enqueues another command while executing.
    struct AppendThenPush {
        label: &'static str,
        sender: CommandSender<TestWorld>,
    }

    impl Command<TestWorld> for AppendThenPush {
        fn execute(self: Box<Self>, world: &mut TestWorld, done: Promise<()>) {
            world.log.push(self.label.to_string());
            self.sender.push(Box::new(Append("deferred")));
            done.complete();
        }
    }

    #[test]
    fn commands_execute_in_push_order() {
        let queue = CommandQueue::new();
        let mut world = TestWorld::default();
        let futures = [
            queue.push(Box::new(Append("a"))),
            queue.push(Box::new(Append("b"))),
            queue.push(Box::new(Append("c"))),
        ];
        queue.drain_and_execute(&mut world);
        assert_eq!(world.log, vec!["a", "b", "c"]);
        for future in futures {
            assert_eq!(future.wait(), Ok(()));
        }
    }

    #[test]
    fn commands_pushed_during_execution_defer_to_next_frame() {
        let queue = CommandQueue::new();
        let mut world = TestWorld::default();
        queue.push(Box::new(AppendThenPush {
            label: "first",
            sender: queue.sender(),
        }));

        queue.drain_and_execute(&mut world);
        assert_eq!(world.log, vec!["first"]);

        queue.drain_and_execute(&mut world);
        assert_eq!(world.log, vec!["first", "deferred"]);
    }

    #[test]
    fn push_from_one_task_observed_in_order_across_frames() {
        let queue = CommandQueue::new();
        let sender = queue.sender();
        let handle = std::thread::spawn(move || {
            sender.push(Box::new(Append("a")));
            sender.push(Box::new(Append("b")));
            sender.push(Box::new(Append("c")));
        });
        handle.join().expect("producer thread panicked");

        let mut world = TestWorld::default();
        // Everything was pushed before the drain, so at most two frames are
        // needed; here a single drain picks all three up.
        queue.drain_and_execute(&mut world);
        queue.drain_and_execute(&mut world);
        assert_eq!(world.log, vec!["a", "b", "c"]);
    }

    #[test]
    fn repeated_pushes_complete_one_future_per_frame_in_order() {
        let queue = CommandQueue::new();
        let mut world = TestWorld::default();
        let mut futures = Vec::new();
        for _ in 0..5 {
            futures.push(queue.push(Box::new(Append("x"))));
        }
        queue.drain_and_execute(&mut world);
        assert_eq!(world.log.len(), 5);
        assert!(futures.into_iter().all(|f| f.wait() == Ok(())));
    }

    #[test]
    fn sender_reports_closed_queue() {
        let sender = {
            let queue: CommandQueue<TestWorld> = CommandQueue::new();
            queue.sender()
        };
        let future = sender.push(Box::new(Append("orphan")));
        assert_eq!(
            future.wait(),
            Err(FutureError::Failed("command queue is closed".into()))
        );
    }
}
