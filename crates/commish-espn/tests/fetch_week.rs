// End-to-end fetch tests against a local mock of the ESPN league endpoint.

use commish_core::cards::{assemble_cards, Favorite};
use commish_core::model::{StarterRule, WeekContext};
use commish_espn::{EspnClient, EspnCookies, FetchError, MatchupSource};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const LEAGUE_FIXTURE: &str = include_str!("fixtures/league_week3.json");

/// Serve one canned HTTP response and hand back the raw request text.
async fn serve_once(status_line: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let n = socket.read(&mut buf).await.unwrap();
        let request = String::from_utf8_lossy(&buf[..n]).to_string();

        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        request
    });

    (format!("http://{addr}/apis/v3/games/ffl"), handle)
}

fn week3() -> WeekContext {
    WeekContext::new(97124817, 2024, 3)
}

#[tokio::test]
async fn fetch_week_normalizes_fixture() {
    let (base, server) = serve_once("200 OK", LEAGUE_FIXTURE.to_string()).await;
    let client = EspnClient::with_base_url(base, None).unwrap();

    let week = client.fetch_week(&week3()).await.unwrap();
    let request = server.await.unwrap();

    assert!(request.starts_with("GET /apis/v3/games/ffl/seasons/2024/segments/0/leagues/97124817?"));
    assert!(request.contains("view=mBoxscore"));
    assert!(request.contains("view=mMatchupScore"));
    assert!(request.contains("scoringPeriodId=3"));
    assert!(!request.to_lowercase().contains("cookie:"));

    assert_eq!(week.pairs, vec![(1, 2), (3, 4)]);
    assert_eq!(week.box_scores.len(), 2);

    let otters = &week.teams[&1];
    assert_eq!(otters.team_name, "River Otters");
    assert_eq!(otters.owner_name, "gridirongreg");
    assert_eq!(otters.record, "5-2");
    assert_eq!(otters.streak, "WIN 3");

    let hawks = &week.teams[&2];
    assert_eq!(hawks.team_name, "Storm Hawks");
    assert_eq!(hawks.owner_name, "Coach of Storm Hawks");
    assert_eq!(hawks.record, "4-3-1");

    assert_eq!(week.teams[&4].owner_name, "Coach of Waiver Wire Wizards");

    let ace = &week.box_scores[0].home.lineup[0];
    assert_eq!(ace.name, "Ace Passer");
    assert_eq!(ace.slot, "QB");
    assert_eq!(ace.projected_points, Some(22.4));
    assert_eq!(ace.actual_points, Some(25.1));
    assert_eq!(week.box_scores[0].home.lineup[3].slot, "BE");
    assert_eq!(week.box_scores[0].away.lineup[3].slot, "IR");
}

#[tokio::test]
async fn fetched_week_feeds_card_assembly() {
    let (base, server) = serve_once("200 OK", LEAGUE_FIXTURE.to_string()).await;
    let client = EspnClient::with_base_url(base, None).unwrap();
    let week = client.fetch_week(&week3()).await.unwrap();
    let _ = server.await;

    let cards = assemble_cards(&week, StarterRule::BenchOnly).unwrap();
    assert_eq!(cards.len(), 2);

    // Bench Star (30.0) is excluded; Hurt Receiver on IR counts under BenchOnly.
    assert_eq!(cards[0].favorite, Favorite::Team("River Otters".into()));
    assert_eq!(cards[0].edge, 8.65);
    assert!(cards[0].is_featured);
    assert!(!cards[1].is_featured);
    assert_eq!(cards[1].favorite, Favorite::Team("Waiver Wire Wizards".into()));
    assert_eq!(cards[1].edge, 3.5);

    let strict = assemble_cards(&week, StarterRule::BenchAndReserve).unwrap();
    assert_eq!(strict[0].edge, 12.65);
}

#[tokio::test]
async fn private_league_sends_cookies() {
    let (base, server) = serve_once("200 OK", LEAGUE_FIXTURE.to_string()).await;
    let cookies = EspnCookies::new("s2-token", "{SWID-VALUE}");
    let client = EspnClient::with_base_url(base, cookies).unwrap();
    assert!(client.has_cookies());

    client.fetch_week(&week3()).await.unwrap();
    let request = server.await.unwrap();
    assert!(request.contains("espn_s2=s2-token; SWID={SWID-VALUE}"));
}

#[tokio::test]
async fn missing_league_maps_to_not_found() {
    let (base, server) = serve_once("404 Not Found", "{}".to_string()).await;
    let client = EspnClient::with_base_url(base, None).unwrap();
    let err = client.fetch_week(&week3()).await.unwrap_err();
    let _ = server.await;
    assert!(matches!(err, FetchError::LeagueNotFound { league_id: 97124817 }));
}

#[tokio::test]
async fn private_league_without_cookies_is_unauthorized() {
    let (base, server) = serve_once("401 Unauthorized", "{}".to_string()).await;
    let client = EspnClient::with_base_url(base, None).unwrap();
    let err = client.fetch_week(&week3()).await.unwrap_err();
    let _ = server.await;
    assert!(matches!(err, FetchError::Unauthorized { .. }));
    assert!(err.to_string().contains("ESPN_S2"));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let (base, server) = serve_once("200 OK", "<html>maintenance</html>".to_string()).await;
    let client = EspnClient::with_base_url(base, None).unwrap();
    let err = client.fetch_week(&week3()).await.unwrap_err();
    let _ = server.await;
    assert!(matches!(err, FetchError::Decode(_)));
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = EspnClient::with_base_url(format!("http://{addr}"), None).unwrap();
    let err = client.fetch_week(&week3()).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
}
