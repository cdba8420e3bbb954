use midibridge::{MidiClient, MidiError, MidiMessage, MockService, Notification};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn client_with_sources(sources: &[&str]) -> (Arc<MockService>, MidiClient<MockService>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let service = Arc::new(MockService::with_sources(sources.iter().copied()));
    let client = MidiClient::new(Arc::clone(&service)).unwrap();
    (service, client)
}

fn note_on(note: u8) -> MidiMessage {
    MidiMessage::NoteOn {
        channel: 0,
        note,
        velocity: 100,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_is_lazy() {
        let (service, client) = client_with_sources(&["Keys"]);

        let _publisher = client.publisher();
        let _another = client.publisher();

        assert_eq!(service.ports_created(), 0);
        assert!(client.ports().is_empty());
        assert!(service.connect_attempts().is_empty());
    }

    #[test]
    fn test_subscribe_registers_one_port_and_refreshes_once() {
        let (service, client) = client_with_sources(&["Keys", "Pads"]);

        let subscription = client.publisher().subscribe(|_message| {}).unwrap();

        assert_eq!(service.ports_created(), 1);
        assert_eq!(client.ports(), vec![subscription.port()]);

        // One refresh over two sources and the single registered port
        let attempts = service.connect_attempts();
        assert_eq!(attempts.len(), 2);
        assert!(attempts.iter().all(|a| a.port == subscription.port()));
        assert!(service.is_connected(subscription.port(), 0));
        assert!(service.is_connected(subscription.port(), 1));
        assert!(subscription.is_active());
    }

    #[test]
    fn test_port_name_is_client_name_plus_suffix() {
        let service = Arc::new(MockService::new());
        let client = MidiClient::open(Arc::clone(&service), "Looper").unwrap();

        let subscription = client.publisher().subscribe(|_message| {}).unwrap();

        assert!(subscription.port_name().starts_with("Looper-"));
        assert!(subscription.port_name().len() > "Looper-".len());
        assert_eq!(
            service.port_name(subscription.port()).as_deref(),
            Some(subscription.port_name())
        );
        assert_eq!(
            service.port_session(subscription.port()),
            Some(client.session())
        );
    }

    #[test]
    fn test_concurrent_subscriptions_have_unique_names() {
        let (_service, client) = client_with_sources(&["Keys"]);
        let publisher = client.publisher();

        let subscriptions: Vec<_> = (0..20)
            .map(|_| publisher.subscribe(|_message| {}).unwrap())
            .collect();

        let names: HashSet<&str> = subscriptions.iter().map(|s| s.port_name()).collect();
        let ports: HashSet<_> = subscriptions.iter().map(|s| s.port()).collect();
        assert_eq!(names.len(), 20);
        assert_eq!(ports.len(), 20);
        assert_eq!(client.ports().len(), 20);
    }

    #[test]
    fn test_messages_reach_subscriber() {
        let (service, client) = client_with_sources(&["Keys"]);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        let _subscription = client
            .publisher()
            .subscribe(move |message| sink.lock().unwrap().push(message))
            .unwrap();

        assert_eq!(service.deliver(0, &[0x90, 60, 100]), 1);
        assert_eq!(service.deliver(0, &[0xF8]), 1);

        assert_eq!(
            *received.lock().unwrap(),
            vec![note_on(60), MidiMessage::Clock]
        );
    }

    #[test]
    fn test_empty_packets_are_not_emitted() {
        let (service, client) = client_with_sources(&["Keys"]);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        let _subscription = client
            .publisher()
            .subscribe(move |message| sink.lock().unwrap().push(message))
            .unwrap();

        service.deliver(0, &[]);
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancel_removes_only_its_own_port() {
        let (service, client) = client_with_sources(&["Keys"]);
        let publisher = client.publisher();
        let kept = publisher.subscribe(|_message| {}).unwrap();
        let cancelled = publisher.subscribe(|_message| {}).unwrap();

        cancelled.cancel();

        assert!(!cancelled.is_active());
        assert_eq!(client.ports(), vec![kept.port()]);
        assert_eq!(service.live_ports(), vec![kept.port()]);
        assert_eq!(service.ports_disposed(), 1);

        // Cancelling again changes nothing
        cancelled.cancel();
        assert_eq!(service.ports_disposed(), 1);
    }

    #[test]
    fn test_no_emissions_after_cancel() {
        let (service, client) = client_with_sources(&["Keys"]);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        let subscription = client
            .publisher()
            .subscribe(move |message| sink.lock().unwrap().push(message))
            .unwrap();

        service.deliver(0, &[0x90, 60, 100]);
        subscription.cancel();
        assert_eq!(service.deliver(0, &[0x90, 62, 100]), 0);

        assert_eq!(*received.lock().unwrap(), vec![note_on(60)]);
    }

    #[test]
    fn test_drop_cancels() {
        let (service, client) = client_with_sources(&["Keys"]);

        let subscription = client.publisher().subscribe(|_message| {}).unwrap();
        let port = subscription.port();
        drop(subscription);

        assert!(!client.has_port(port));
        assert!(service.live_ports().is_empty());
    }

    #[test]
    fn test_port_creation_failure_leaves_registry_untouched() {
        let (service, client) = client_with_sources(&["Keys"]);
        service.refuse_ports(true);

        let result = client.publisher().subscribe(|_message| {});

        assert!(matches!(result, Err(MidiError::PortCreate(_))));
        assert!(client.ports().is_empty());
        assert!(service.connect_attempts().is_empty());
    }

    #[test]
    fn test_subscription_picks_up_new_sources() {
        let (service, client) = client_with_sources(&["Keys"]);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        let _subscription = client
            .publisher()
            .subscribe(move |message| sink.lock().unwrap().push(message))
            .unwrap();

        service.add_source("Pads");
        assert_eq!(service.deliver(1, &[0xFA]), 0);

        service.notify(Notification::SetupChanged);
        assert_eq!(service.deliver(1, &[0xFA]), 1);
        assert_eq!(*received.lock().unwrap(), vec![MidiMessage::Start]);
    }

    #[test]
    fn test_subscription_keeps_session_alive() {
        let (service, client) = client_with_sources(&["Keys"]);
        let subscription = client.publisher().subscribe(|_message| {}).unwrap();

        drop(client);
        assert_eq!(service.live_sessions(), 1);

        drop(subscription);
        assert_eq!(service.live_sessions(), 0);
    }

    #[test]
    fn test_stream_yields_messages_in_order() {
        let (service, client) = client_with_sources(&["Keys"]);
        let stream = client.stream().unwrap();

        service.deliver(0, &[0x90, 60, 100]);
        service.deliver(0, &[0x80, 60, 0]);
        service.deliver(0, &[0xB0, 7, 90]);

        assert_eq!(stream.try_recv(), Some(note_on(60)));
        assert_eq!(
            stream.recv_timeout(Duration::from_millis(100)).unwrap(),
            MidiMessage::NoteOff {
                channel: 0,
                note: 60,
                velocity: 0
            }
        );
        assert_eq!(
            stream.recv(),
            Some(MidiMessage::ControlChange {
                channel: 0,
                controller: 7,
                value: 90
            })
        );
        assert_eq!(stream.try_recv(), None);
    }

    #[test]
    fn test_stream_ends_after_cancel() {
        let (service, client) = client_with_sources(&["Keys"]);
        let mut stream = client.stream().unwrap();
        let port = stream.port();

        service.deliver(0, &[0xF8]);
        stream.cancel();
        service.deliver(0, &[0xF8]);

        // Queued before cancellation, then the end of the stream
        assert_eq!(stream.next(), Some(MidiMessage::Clock));
        assert_eq!(stream.next(), None);
        assert!(!client.has_port(port));
    }

    #[test]
    fn test_stream_cancel_from_another_thread() {
        let (service, client) = client_with_sources(&["Keys"]);
        let stream = client.stream().unwrap();
        let cancel = stream.cancel_handle();

        let producer = {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for note in 60..64 {
                    service.deliver(0, &[0x90, note, 100]);
                }
                thread::sleep(Duration::from_millis(50));
                cancel.cancel();
            })
        };

        let collected: Vec<MidiMessage> = stream.collect();
        producer.join().unwrap();

        assert_eq!(
            collected,
            vec![note_on(60), note_on(61), note_on(62), note_on(63)]
        );
        assert!(client.ports().is_empty());
    }

    #[test]
    fn test_cancel_waits_for_delivery_in_progress() {
        let (service, client) = client_with_sources(&["Keys"]);

        for _ in 0..50 {
            let delivered = Arc::new(AtomicUsize::new(0));
            let cancel_returned = Arc::new(AtomicBool::new(false));
            let late = Arc::new(AtomicUsize::new(0));

            let subscription = {
                let delivered = Arc::clone(&delivered);
                let cancel_returned = Arc::clone(&cancel_returned);
                let late = Arc::clone(&late);
                client
                    .publisher()
                    .subscribe(move |_message| {
                        thread::yield_now();
                        if cancel_returned.load(Ordering::SeqCst) {
                            late.fetch_add(1, Ordering::SeqCst);
                        }
                        delivered.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap()
            };

            let stop = Arc::new(AtomicBool::new(false));
            let producer = {
                let service = Arc::clone(&service);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    while !stop.load(Ordering::SeqCst) {
                        service.deliver(0, &[0xF8]);
                    }
                })
            };

            while delivered.load(Ordering::SeqCst) == 0 {
                thread::yield_now();
            }
            subscription.cancel();
            cancel_returned.store(true, Ordering::SeqCst);
            let at_cancel = delivered.load(Ordering::SeqCst);

            thread::sleep(Duration::from_millis(1));
            stop.store(true, Ordering::SeqCst);
            producer.join().unwrap();

            assert_eq!(late.load(Ordering::SeqCst), 0);
            assert_eq!(delivered.load(Ordering::SeqCst), at_cancel);
        }
        assert!(client.ports().is_empty());
    }

    #[test]
    fn test_streams_are_independent_subscriptions() {
        let (service, client) = client_with_sources(&["Keys"]);
        let first = client.stream().unwrap();
        let second = client.publisher().stream().unwrap();

        assert_ne!(first.port(), second.port());
        assert_eq!(service.deliver(0, &[0xFC]), 2);
        assert_eq!(first.try_recv(), Some(MidiMessage::Stop));
        assert_eq!(second.try_recv(), Some(MidiMessage::Stop));

        first.cancel();
        assert!(second.subscription().is_active());
        assert_eq!(client.ports(), vec![second.port()]);
    }
}
