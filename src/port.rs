use std::net::TcpListener;

/// Scans upward from `start` for a bindable port, at most `max_tries`
/// candidates and never past 65535.
pub fn find_available_port(host: &str, start: u16, max_tries: u16) -> Option<u16> {
    (0..max_tries)
        .map_while(|offset| start.checked_add(offset))
        .find(|port| match TcpListener::bind((host, *port)) {
            Ok(listener) => {
                drop(listener);
                true
            }
            Err(error) => {
                tracing::debug!(port = *port, error = %error, "port unavailable");
                false
            }
        })
}

#[cfg(test)]
mod tests {
    use super::find_available_port;
    use std::net::TcpListener;

    const HOST: &str = "127.0.0.1";

    fn occupy() -> (TcpListener, u16) {
        let listener = TcpListener::bind((HOST, 0)).expect("bind ephemeral");
        let port = listener.local_addr().expect("local addr").port();
        (listener, port)
    }

    #[test]
    fn free_start_port_is_returned() {
        let (listener, port) = occupy();
        drop(listener);
        assert_eq!(find_available_port(HOST, port, 1), Some(port));
    }

    #[test]
    fn fully_occupied_range_returns_none() {
        let (_held, port) = occupy();
        assert_eq!(find_available_port(HOST, port, 1), None);
    }

    #[test]
    fn skips_occupied_start_and_returns_first_free_candidate() {
        let (_held, port) = occupy();
        let found = find_available_port(HOST, port, 20).expect("a free port nearby");
        assert!(found > port);
        assert!(found < port.saturating_add(20));
        for skipped in port + 1..found {
            assert!(
                TcpListener::bind((HOST, skipped)).is_err(),
                "port {skipped} was free but skipped"
            );
        }
    }

    #[test]
    fn zero_tries_finds_nothing() {
        assert_eq!(find_available_port(HOST, 5000, 0), None);
    }

    #[test]
    fn scan_never_wraps_past_last_port() {
        let found = find_available_port(HOST, u16::MAX, 5);
        assert!(found.is_none() || found == Some(u16::MAX));
    }
}
