use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

/// Two tracks; the second one omits most optional fields.
pub const SEARCH_FIXTURE: &str = r#"{
  "resultCount": 2,
  "results": [
    {
      "wrapperType": "track",
      "kind": "song",
      "artistId": 909253,
      "collectionId": 1440857781,
      "trackId": 1440857786,
      "artistName": "Jack Johnson",
      "collectionName": "In Between Dreams (Bonus Track Version)",
      "trackName": "Better Together",
      "collectionCensoredName": "In Between Dreams (Bonus Track Version)",
      "trackCensoredName": "Better Together",
      "artistViewUrl": "https://music.apple.com/us/artist/jack-johnson/909253",
      "collectionViewUrl": "https://music.apple.com/us/album/better-together/1440857781",
      "trackViewUrl": "https://music.apple.com/us/album/better-together/1440857781?i=1440857786",
      "previewUrl": "https://audio-ssl.itunes.apple.com/preview.m4a",
      "artworkUrl30": "https://is1-ssl.mzstatic.com/30x30bb.jpg",
      "artworkUrl60": "https://is1-ssl.mzstatic.com/60x60bb.jpg",
      "artworkUrl100": "https://is1-ssl.mzstatic.com/100x100bb.jpg",
      "collectionPrice": 9.99,
      "trackPrice": 1.29,
      "releaseDate": "2005-03-01T08:00:00Z",
      "collectionExplicitness": "notExplicit",
      "trackExplicitness": "notExplicit",
      "discCount": 1,
      "discNumber": 1,
      "trackCount": 16,
      "trackNumber": 1,
      "trackTimeMillis": 207679,
      "country": "USA",
      "currency": "USD",
      "primaryGenreName": "Rock",
      "isStreamable": true
    },
    {
      "wrapperType": "track",
      "kind": "song",
      "artistName": "Jack Johnson",
      "trackName": "Banana Pancakes",
      "someFutureField": {"nested": true}
    }
  ]
}"#;

/// Start a mock upstream that answers every request with `respond(request)`.
///
/// Returns the `/search` URL of the server.
pub async fn start_mock_upstream<F, Fut>(respond: F) -> Url
where
    F: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (StatusCode, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);
            let respond = respond.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let fut = (*respond)(req);
                    async move {
                        let (status, body) = fut.await;
                        let mut response = Response::new(Full::new(Bytes::from(body)));
                        *response.status_mut() = status;
                        Ok::<_, Infallible>(response)
                    }
                });

                let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, service)
                    .await;
            });
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    Url::parse(&format!("http://127.0.0.1:{port}/search")).unwrap()
}

/// Returns a port nothing is listening on.
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Extracts the `term` parameter the router sent upstream.
pub fn term_of<B>(req: &Request<B>) -> Option<String> {
    url::form_urlencoded::parse(req.uri().query().unwrap_or_default().as_bytes())
        .find(|(key, _)| key == "term")
        .map(|(_, value)| value.into_owned())
}
