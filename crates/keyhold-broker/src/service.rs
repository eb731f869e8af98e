//! Line-oriented request loop.
//!
//! Reads one JSON request per line, runs each on the blocking pool, and
//! writes one JSON response per line. Responses are written in completion
//! order; callers correlate them by `id`. At most `workers` requests execute
//! at once. On end of input the loop waits for every in-flight request to
//! answer before returning.

use std::{io, sync::Arc};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::{Semaphore, mpsc},
};

use crate::{
    broker::KeyBroker,
    config::MAX_WORKERS,
    entropy::Entropy,
    request::{ErrorBody, ResponseEnvelope, handle_line},
};

/// Serve requests from `input` until end of input, writing responses to
/// `output`.
///
/// Returns the writer once every response has been flushed. At most
/// `workers` encoded responses wait for the writer; a stalled `output`
/// stalls the workers, and with them the reading of further requests.
///
/// # Errors
///
/// Fails if reading `input` or writing `output` fails. Malformed requests,
/// including lines that are not UTF-8, are answered, never surfaced here.
pub async fn serve<E, R, W>(
    broker: Arc<KeyBroker<E>>,
    input: R,
    output: W,
    workers: usize,
) -> io::Result<W>
where
    E: Entropy,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let workers = workers.clamp(1, MAX_WORKERS);
    let permits = Arc::new(Semaphore::new(workers));
    let (tx, rx) = mpsc::channel::<String>(workers);
    let writer = tokio::spawn(write_responses(rx, output));

    tracing::info!(workers, "serving requests");

    let mut reader = BufReader::new(input);
    let mut buf = Vec::new();
    let mut received = 0u64;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        received += 1;

        let line = match String::from_utf8(std::mem::take(&mut buf)) {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(error = %e, "rejecting non UTF-8 request line");
                let response = ResponseEnvelope::error(None, ErrorBody::bad_request(e.to_string()));
                queue(&tx, &response).await;
                continue;
            },
        };

        let permit = Arc::clone(&permits).acquire_owned().await.map_err(io::Error::other)?;
        let broker = Arc::clone(&broker);
        let tx = tx.clone();

        tokio::task::spawn_blocking(move || {
            let response = handle_line(&broker, &line);
            if let Some(encoded) = encode(&response)
                && tx.blocking_send(encoded).is_err()
            {
                tracing::debug!("response writer gone, dropping response");
            }
            drop(permit);
        });
    }

    // Every permit back means every request has queued its response
    let _drained = permits.acquire_many(workers as u32).await.map_err(io::Error::other)?;
    drop(tx);

    tracing::info!(received, "input closed, all requests answered");

    writer.await.map_err(io::Error::other)?
}

async fn queue(tx: &mpsc::Sender<String>, response: &ResponseEnvelope) {
    if let Some(encoded) = encode(response)
        && tx.send(encoded).await.is_err()
    {
        tracing::debug!("response writer gone, dropping response");
    }
}

fn encode(response: &ResponseEnvelope) -> Option<String> {
    match serde_json::to_string(response) {
        Ok(encoded) => Some(encoded),
        Err(e) => {
            tracing::error!("Failed to encode response: {}", e);
            None
        },
    }
}

async fn write_responses<W: AsyncWrite + Unpin>(
    mut rx: mpsc::Receiver<String>,
    mut output: W,
) -> io::Result<W> {
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        output.write_all(line.as_bytes()).await?;
        output.flush().await?;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use keyhold_crypto::RootSecret;
    use serde_json::Value;

    use super::*;
    use crate::entropy::SystemEntropy;

    fn broker() -> Arc<KeyBroker> {
        let root = RootSecret::from_bytes(b"service_test_root_secret_32bytes".to_vec()).unwrap();
        Arc::new(KeyBroker::new(root, SystemEntropy::new()))
    }

    fn responses(output: &[u8]) -> Vec<Value> {
        std::str::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn one_response_per_nonblank_line() {
        let input = b"{\"id\":1,\"op\":\"get_pubkey\",\"service_name\":\"a\"}\n\n   \n{\"id\":2,\"op\":\"get_pubkey\",\"service_name\":\"b\"}\n";

        let output = serve(broker(), &input[..], Vec::new(), 2).await.unwrap();
        let mut ids: Vec<u64> =
            responses(&output).iter().map(|r| r["id"].as_u64().unwrap()).collect();
        ids.sort_unstable();

        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn empty_input_produces_no_output() {
        let output = serve(broker(), &b""[..], Vec::new(), 1).await.unwrap();
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_answered_without_id() {
        let input = b"\xc3\x28\n";

        let output = serve(broker(), &input[..], Vec::new(), 1).await.unwrap();
        let responses = responses(&output);

        assert_eq!(responses.len(), 1);
        assert!(responses[0]["id"].is_null());
        assert_eq!(responses[0]["error"]["kind"], "bad_request");
    }

    #[tokio::test]
    async fn zero_workers_still_makes_progress() {
        let input = b"{\"id\":3,\"op\":\"get_pubkey\",\"service_name\":\"a\"}\n";

        let output = serve(broker(), &input[..], Vec::new(), 0).await.unwrap();

        assert_eq!(responses(&output).len(), 1);
    }
}
