//! Bounded pool of scoped worker threads fed by one producer
//!
//! Used to fan composited frames out to the workers that crop and quantize them.

use crate::error::CatResult;
use crate::Error;
use crossbeam_channel::Sender;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};

/// Runs `producer` on the calling thread and `consumer` on `num_threads` workers.
///
/// `cancel` is shared with whoever else may stop the work early. It is raised here when the
/// consumer fails or panics. Once it's up, workers don't start any new message,
/// and the producer's `send` fails as soon as all workers have quit.
pub fn new<P, C, M, R>(num_threads: usize, name: &str, cancel: &AtomicBool, producer: P, mut consumer: C) -> CatResult<R> where
    M: Send,
    C: Clone + Send + FnMut(M) -> CatResult<()>,
    P: FnOnce(Sender<M>) -> CatResult<R>,
{
    debug_assert!(num_threads > 0);
    let num_threads = num_threads.max(1);

    std::thread::scope(move |scope| {
        let (s, r) = crossbeam_channel::bounded(num_threads.min(4));
        let thread = move || {
            catch_unwind(AssertUnwindSafe(move || {
                for m in r {
                    if cancel.load(SeqCst) {
                        break;
                    }
                    if let Err(e) = consumer(m) {
                        cancel.store(true, SeqCst);
                        return Err(e);
                    }
                }
                Ok(())
            })).map_err(move |_| {
                cancel.store(true, SeqCst);
                Error::ThreadSend
            })?
        };
        let spawn = move |n, thread| {
            std::thread::Builder::new().name(format!("{name}{n}")).spawn_scoped(scope, thread).map_err(|_| {
                cancel.store(true, SeqCst);
                Error::ThreadSend
            })
        };

        let mut handles = Vec::with_capacity(num_threads);
        for n in 0..num_threads - 1 {
            handles.push(spawn(n, thread.clone())?);
        }
        handles.push(spawn(num_threads - 1, thread)?);
        log::debug!("started {num_threads} {name} workers");

        let res = producer(s).map_err(|e| {
            cancel.store(true, SeqCst);
            e
        });
        // panics have been caught, so join can only fail on an internal error
        let joined = handles.into_iter().map(|h| h.join().map_err(|_| Error::ThreadSend)?).fold(Ok(()), |acc: CatResult<()>, r| acc.and(r));
        let res = res?;
        joined?;
        Ok(res)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[test]
    fn every_message_consumed_once() {
        let cancel = AtomicBool::new(false);
        let seen = Mutex::new(Vec::new());
        let seen_ref = &seen;
        let sent = new(3, "test", &cancel, |s| {
            for i in 0..50 {
                s.send(i)?;
            }
            Ok(50)
        }, move |m: usize| {
            seen_ref.lock().unwrap().push(m);
            Ok(())
        }).unwrap();
        assert_eq!(sent, 50);
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
        assert!(!cancel.load(SeqCst));
    }

    #[test]
    fn failure_stops_new_work() {
        let cancel = AtomicBool::new(false);
        let started = AtomicUsize::new(0);
        let started_ref = &started;
        let res = new(2, "test", &cancel, |s| {
            for i in 0..1000 {
                if s.send(i).is_err() {
                    break;
                }
            }
            Ok(())
        }, move |m: usize| {
            started_ref.fetch_add(1, SeqCst);
            if m == 3 {
                return Err(Error::Bounds("nope".into()));
            }
            Ok(())
        });
        assert!(matches!(res, Err(Error::Bounds(_))));
        assert!(cancel.load(SeqCst));
        assert!(started.load(SeqCst) < 1000);
    }

    #[test]
    fn panic_is_caught() {
        let cancel = AtomicBool::new(false);
        let res = new(2, "test", &cancel, |s| {
            for i in 0..10 {
                if s.send(i).is_err() {
                    break;
                }
            }
            Ok(())
        }, |m: u32| {
            assert!(m != 5, "worker panic");
            Ok(())
        });
        assert!(matches!(res, Err(Error::ThreadSend)));
        assert!(cancel.load(SeqCst));
    }
}
