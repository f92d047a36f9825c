//! Trajectory dispatcher.
//!
//! Expands each command into target points for the follower. Repeating
//! patterns keep going until another command is queued; the queue is only
//! checked between whole sweeps or whole patrol cycles, so a new command
//! waits for the one in flight to close its current revolution.

use tokio::sync::broadcast;
use tokio::sync::mpsc;

use crate::error::PipelineError;
use crate::models::{GeoPoint, PathType, TargetPoint, TrajectoryCommand};
use crate::pattern::{self, Frequencies};
use crate::queue::CommandReceiver;
use crate::shutdown;

pub struct TrajectoryDispatcher {
    commands: CommandReceiver,
    targets: mpsc::Sender<TargetPoint>,
    /// Step threshold for sampling and leg speed for every target.
    step: f64,
    shutdown: broadcast::Receiver<()>,
    stopped: bool,
}

impl TrajectoryDispatcher {
    pub fn new(
        commands: CommandReceiver,
        targets: mpsc::Sender<TargetPoint>,
        step: f64,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            commands,
            targets,
            step,
            shutdown,
            stopped: false,
        }
    }

    /// Dequeue and expand commands until shutdown or until every submitter is gone.
    pub async fn run(mut self) {
        loop {
            let command = tokio::select! {
                _ = shutdown::signalled(&mut self.shutdown) => {
                    tracing::info!("Dispatcher shutting down");
                    break;
                }
                next = self.commands.recv() => match next {
                    Some(command) => command,
                    None => {
                        tracing::info!("Command queue closed");
                        break;
                    }
                },
            };

            tracing::info!(
                "Executing {} trajectory from ({}, {}) to ({}, {})",
                command.path_type,
                command.start.lat,
                command.start.lon,
                command.end.lat,
                command.end.lon
            );

            if let Err(err) = self.expand(&command).await {
                tracing::warn!("Dispatcher stopped: {}", err);
                break;
            }
            if self.stopped {
                tracing::info!("Dispatcher shutting down");
                break;
            }
        }
    }

    /// Expand one command. Returns once the command completes or is preempted.
    pub async fn expand(&mut self, command: &TrajectoryCommand) -> Result<(), PipelineError> {
        self.emit(command.start).await?;

        let left = command.left_control();
        let right = command.right_control();

        match command.path_type {
            PathType::Sine => {
                let (outer, inner) = command.frequencies();
                self.sweep_until_preempted(command, left, right, Frequencies::new(outer, inner))
                    .await?;
                if self.stopped {
                    return Ok(());
                }
                self.emit(command.end).await?;
            }
            PathType::Figure8 => {
                self.sweep_until_preempted(command, left, right, Frequencies::FIGURE8)
                    .await?;
            }
            PathType::Clockwise => {
                self.sweep_until_preempted(command, left, right, Frequencies::CLOCKWISE)
                    .await?;
            }
            PathType::CounterClockwise => {
                self.sweep_until_preempted(command, right, left, Frequencies::COUNTER_CLOCKWISE)
                    .await?;
            }
            PathType::Patrol => {
                self.patrol_until_preempted(&command.points).await?;
                if self.stopped {
                    return Ok(());
                }
                self.emit(command.end).await?;
            }
            PathType::Random | PathType::Unrecognized => {
                self.emit(command.end).await?;
            }
        }
        Ok(())
    }

    async fn sweep_until_preempted(
        &mut self,
        command: &TrajectoryCommand,
        left: Option<&GeoPoint>,
        right: Option<&GeoPoint>,
        freq: Frequencies,
    ) -> Result<(), PipelineError> {
        let mut sweeps = 0u64;
        while !self.preempted() {
            let sweep = pattern::sample(&command.start, &command.end, left, right, freq, self.step);
            for target in sweep {
                self.send(target).await?;
            }
            sweeps += 1;
        }
        tracing::debug!("{} preempted after {} sweep(s)", command.path_type, sweeps);
        Ok(())
    }

    async fn patrol_until_preempted(&mut self, points: &[GeoPoint]) -> Result<(), PipelineError> {
        if points.is_empty() {
            tracing::warn!("Patrol without points, heading to end point");
            return Ok(());
        }

        let mut cycles = 0u64;
        while !self.preempted() {
            for point in points {
                self.emit(*point).await?;
            }
            cycles += 1;
        }
        tracing::debug!("patrol preempted after {} cycle(s)", cycles);
        Ok(())
    }

    /// True once another command is waiting or shutdown was signalled.
    fn preempted(&mut self) -> bool {
        if shutdown::requested(&mut self.shutdown) {
            self.stopped = true;
        }
        self.stopped || self.commands.has_pending()
    }

    async fn emit(&self, position: GeoPoint) -> Result<(), PipelineError> {
        self.send(TargetPoint::new(position, self.step)).await
    }

    async fn send(&self, target: TargetPoint) -> Result<(), PipelineError> {
        self.targets
            .send(target)
            .await
            .map_err(|_| PipelineError::QueueClosed("targets"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{command_queue, CommandSender};
    use std::time::Duration;

    const STEP: f64 = 1.0;

    struct Harness {
        commands: CommandSender,
        targets: mpsc::Receiver<TargetPoint>,
        shutdown: broadcast::Sender<()>,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn_dispatcher() -> Harness {
        let (commands, receiver) = command_queue(2);
        let (target_tx, targets) = mpsc::channel(1);
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let dispatcher = TrajectoryDispatcher::new(receiver, target_tx, STEP, shutdown_rx);
        let task = tokio::spawn(dispatcher.run());
        Harness {
            commands,
            targets,
            shutdown,
            task,
        }
    }

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon, 0.0)
    }

    async fn next(rx: &mut mpsc::Receiver<TargetPoint>) -> GeoPoint {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no target within timeout")
            .expect("target queue closed")
            .position
    }

    async fn collect_until(rx: &mut mpsc::Receiver<TargetPoint>, stop: GeoPoint) -> Vec<GeoPoint> {
        let mut seen = Vec::new();
        for _ in 0..20_000 {
            let point = next(rx).await;
            seen.push(point);
            if point == stop {
                return seen;
            }
        }
        panic!("never reached {:?}", stop);
    }

    fn interrupt() -> TrajectoryCommand {
        TrajectoryCommand::new(PathType::Random, p(77.0, 77.0), p(88.0, 88.0))
    }

    fn assert_whole_sweeps(samples: &[GeoPoint], sweep: &[GeoPoint]) {
        assert!(!samples.is_empty());
        assert_eq!(samples.len() % sweep.len(), 0, "partial sweep before preemption");
        for chunk in samples.chunks(sweep.len()) {
            assert_eq!(chunk, sweep);
        }
    }

    fn sweep_of(
        start: GeoPoint,
        end: GeoPoint,
        left: Option<&GeoPoint>,
        right: Option<&GeoPoint>,
        freq: Frequencies,
    ) -> Vec<GeoPoint> {
        pattern::sample(&start, &end, left, right, freq, STEP)
            .map(|t| t.position)
            .collect()
    }

    #[tokio::test]
    async fn random_flies_start_then_end() {
        let mut h = spawn_dispatcher();
        h.commands
            .submit(TrajectoryCommand::new(PathType::Random, p(1.0, 1.0), p(2.0, 2.0)))
            .await
            .unwrap();

        assert_eq!(next(&mut h.targets).await, p(1.0, 1.0));
        assert_eq!(next(&mut h.targets).await, p(2.0, 2.0));
        assert!(h.targets.try_recv().is_err());
    }

    #[tokio::test]
    async fn unrecognized_flies_start_then_end() {
        let mut h = spawn_dispatcher();
        h.commands
            .submit(TrajectoryCommand::new(PathType::Unrecognized, p(3.0, 3.0), p(4.0, 4.0)))
            .await
            .unwrap();

        assert_eq!(next(&mut h.targets).await, p(3.0, 3.0));
        assert_eq!(next(&mut h.targets).await, p(4.0, 4.0));
    }

    #[tokio::test]
    async fn targets_carry_step_speed() {
        let mut h = spawn_dispatcher();
        h.commands
            .submit(TrajectoryCommand::new(PathType::Random, p(1.0, 1.0), p(2.0, 2.0)))
            .await
            .unwrap();

        let target = h.targets.recv().await.unwrap();
        assert_eq!(target.speed, STEP);
    }

    #[tokio::test]
    async fn sine_sweeps_until_preempted_then_transits_to_end() {
        let mut h = spawn_dispatcher();
        let (start, end) = (p(0.0, 0.0), p(0.0, 10.0));
        h.commands
            .submit(TrajectoryCommand::new(PathType::Sine, start, end).with_data(vec![2.0, 1.0]))
            .await
            .unwrap();

        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(next(&mut h.targets).await);
        }
        assert_eq!(seen[0], start);
        h.commands.submit(interrupt()).await.unwrap();

        seen.extend(collect_until(&mut h.targets, p(88.0, 88.0)).await);
        // ... samples, end, interrupt start, interrupt end
        let n = seen.len();
        assert_eq!(seen[n - 1], p(88.0, 88.0));
        assert_eq!(seen[n - 2], p(77.0, 77.0));
        assert_eq!(seen[n - 3], end);

        let sweep = sweep_of(start, end, None, None, Frequencies::new(2.0, 1.0));
        assert_whole_sweeps(&seen[1..n - 3], &sweep);
    }

    #[tokio::test]
    async fn clockwise_has_no_final_transit() {
        let mut h = spawn_dispatcher();
        let (start, end) = (p(0.0, 0.0), p(0.0, 10.0));
        h.commands
            .submit(TrajectoryCommand::new(PathType::Clockwise, start, end))
            .await
            .unwrap();

        let mut seen = vec![next(&mut h.targets).await, next(&mut h.targets).await];
        assert_eq!(seen[0], start);
        h.commands.submit(interrupt()).await.unwrap();

        seen.extend(collect_until(&mut h.targets, p(88.0, 88.0)).await);
        let n = seen.len();
        assert_eq!(seen[n - 2], p(77.0, 77.0));

        let sweep = sweep_of(start, end, None, None, Frequencies::CLOCKWISE);
        assert_whole_sweeps(&seen[1..n - 2], &sweep);
    }

    #[tokio::test]
    async fn figure8_uses_fixed_frequencies() {
        let mut h = spawn_dispatcher();
        let (start, end) = (p(0.0, 0.0), p(0.0, 10.0));
        h.commands
            .submit(TrajectoryCommand::new(PathType::Figure8, start, end).with_data(vec![9.0, 9.0]))
            .await
            .unwrap();

        next(&mut h.targets).await;
        let sweep = sweep_of(start, end, None, None, Frequencies::FIGURE8);
        for expected in sweep.iter().take(10) {
            assert_eq!(next(&mut h.targets).await, *expected);
        }
    }

    #[tokio::test]
    async fn counter_clockwise_swaps_controls() {
        let mut h = spawn_dispatcher();
        let (start, end) = (p(0.0, 0.0), p(0.0, 10.0));
        let (left, right) = (p(3.0, 5.0), p(-3.0, 5.0));
        let command = TrajectoryCommand::new(PathType::CounterClockwise, start, end)
            .with_points(vec![left, right]);
        h.commands
            .submit(command)
            .await
            .unwrap();

        next(&mut h.targets).await;
        let sweep = sweep_of(start, end, Some(&right), Some(&left), Frequencies::COUNTER_CLOCKWISE);
        for expected in sweep.iter().take(10) {
            assert_eq!(next(&mut h.targets).await, *expected);
        }
    }

    #[tokio::test]
    async fn patrol_finishes_cycle_before_next_command() {
        let mut h = spawn_dispatcher();
        let (a, b, c) = (p(1.0, 1.0), p(2.0, 2.0), p(3.0, 3.0));
        let end = p(9.0, 9.0);
        let command =
            TrajectoryCommand::new(PathType::Patrol, p(0.0, 0.0), end).with_points(vec![a, b, c]);
        h.commands
            .submit(command)
            .await
            .unwrap();

        assert_eq!(next(&mut h.targets).await, p(0.0, 0.0));
        assert_eq!(next(&mut h.targets).await, a);
        assert_eq!(next(&mut h.targets).await, b);
        // Mid-cycle.
        h.commands.submit(interrupt()).await.unwrap();

        let rest = collect_until(&mut h.targets, p(88.0, 88.0)).await;
        let n = rest.len();
        assert_eq!(rest[n - 2], p(77.0, 77.0));
        assert_eq!(rest[n - 3], end);

        // Everything between the submit and the end point is whole patrol
        // cycles, starting with the remainder of the interrupted one.
        let patrol = &rest[..n - 3];
        assert_eq!(patrol[0], c);
        let cycle = [a, b, c];
        assert_eq!((patrol.len() - 1) % 3, 0);
        for chunk in patrol[1..].chunks(3) {
            assert_eq!(chunk, cycle);
        }
        assert_eq!(rest.iter().filter(|pt| **pt == end).count(), 1);
    }

    #[tokio::test]
    async fn patrol_without_points_goes_to_end() {
        let mut h = spawn_dispatcher();
        h.commands
            .submit(TrajectoryCommand::new(PathType::Patrol, p(1.0, 1.0), p(2.0, 2.0)))
            .await
            .unwrap();

        assert_eq!(next(&mut h.targets).await, p(1.0, 1.0));
        assert_eq!(next(&mut h.targets).await, p(2.0, 2.0));
    }

    #[tokio::test]
    async fn commands_are_expanded_in_fifo_order() {
        let mut h = spawn_dispatcher();
        let commands = h.commands.clone();
        // More commands than the queue holds: the submitter has to wait.
        tokio::spawn(async move {
            for i in 0..4 {
                let f = f64::from(i);
                commands
                    .submit(TrajectoryCommand::new(PathType::Random, p(f, 0.0), p(f, 1.0)))
                    .await
                    .unwrap();
            }
        });

        for i in 0..4 {
            let f = f64::from(i);
            assert_eq!(next(&mut h.targets).await, p(f, 0.0));
            assert_eq!(next(&mut h.targets).await, p(f, 1.0));
        }
    }

    #[tokio::test]
    async fn shutdown_stops_endless_patrol() {
        let mut h = spawn_dispatcher();
        h.commands
            .submit(
                TrajectoryCommand::new(PathType::Patrol, p(0.0, 0.0), p(9.0, 9.0))
                    .with_points(vec![p(1.0, 1.0), p(2.0, 2.0)]),
            )
            .await
            .unwrap();

        next(&mut h.targets).await;
        next(&mut h.targets).await;
        h.shutdown.send(()).unwrap();

        // Drain whatever is in flight; the task must finish without an end transit.
        let mut drained = Vec::new();
        let finished = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(t) = h.targets.recv().await {
                drained.push(t.position);
            }
        })
        .await;
        assert!(finished.is_ok());
        assert!(!drained.contains(&p(9.0, 9.0)));
        assert!(h.task.await.is_ok());
    }
}
