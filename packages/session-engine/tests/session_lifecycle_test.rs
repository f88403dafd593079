mod common;

use common::{TestEngine, START};
use session_engine::models::move_request::MoveRequest;
use session_engine::repositories::match_repository::MatchRepository;
use session_engine::repositories::player_repository::PlayerRepository;
use session_engine::repositories::session_repository::SessionRepository;
use session_engine::{Color, EngineConfig, GameSessionServiceError, Winner};

#[tokio::test]
async fn full_game_is_recorded_and_rated() -> anyhow::Result<()> {
    let engine = TestEngine::new(&["alice", "bob"]).await;
    let (session_id, white, black) = engine.start("alice", "bob").await;

    let plies = [
        (&white, "e2", "e4"),
        (&black, "e7", "e5"),
        (&white, "f1", "c4"),
        (&black, "b8", "c6"),
        (&white, "d1", "h5"),
        (&black, "g8", "f6"),
    ];
    for (i, (user, from, to)) in plies.iter().enumerate() {
        let result = engine
            .service
            .make_move(
                &session_id,
                user,
                &MoveRequest::new(from, to),
                START + 2_000 * (i as i64 + 1),
            )
            .await?;
        assert!(result.result.is_none());
    }

    let mate = engine
        .service
        .make_move(&session_id, &white, &MoveRequest::new("h5", "f7"), START + 20_000)
        .await?;

    let result = mate.result.expect("Scholar's mate should end the game");
    assert_eq!(result.winner, Winner::White);
    assert_eq!(result.rating_change.white_new_rating, 1510);
    assert_eq!(result.rating_change.black_new_rating, 1490);

    let record = engine.matches.get_match(&session_id).await?.expect("match record");
    assert_eq!(record.winner, Some(Winner::White));
    assert!(record.ended_at.is_some());

    let moves = engine.matches.list_moves(&session_id).await?;
    let numbers: Vec<u32> = moves.iter().map(|m| m.move_number).collect();
    assert_eq!(numbers, (1..=7).collect::<Vec<u32>>());
    assert_eq!(moves[6].notation, "h5f7");
    assert_eq!(moves[6].color, Color::White);

    assert_eq!(engine.sessions.get(&session_id).await?, None);
    assert_eq!(engine.sessions.get_active_session_id(&white).await?, None);
    assert_eq!(engine.players.get_player(&white).await?.games_played, 41);

    let history = engine.service.get_match_history(&black, 10, 0).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].winner, Some(Winner::White));

    let replay = engine.service.get_match_with_moves(&session_id).await?;
    assert_eq!(replay.moves.len(), 7);

    Ok(())
}

#[tokio::test]
async fn clocks_follow_the_lazy_model() -> anyhow::Result<()> {
    let engine = TestEngine::new(&["alice", "bob"]).await;
    let (session_id, white, black) = engine.start("alice", "bob").await;
    let initial = EngineConfig::default().initial_clock_ms;

    engine
        .service
        .make_move(&session_id, &white, &MoveRequest::new("d2", "d4"), START + 3_000)
        .await?;
    let before = engine.sessions.get(&session_id).await?.expect("session");

    engine
        .service
        .make_move(&session_id, &black, &MoveRequest::new("d7", "d5"), START + 10_000)
        .await?;
    let after = engine.sessions.get(&session_id).await?.expect("session");

    assert_eq!(
        after.stored_remaining_ms(Color::Black),
        Some(before.stored_remaining_ms(Color::Black).unwrap_or_default() - 7_000)
    );
    assert_eq!(
        after.stored_remaining_ms(Color::White),
        before.stored_remaining_ms(Color::White)
    );

    let times = engine.service.get_times(&session_id, START + 15_000).await?;
    assert_eq!(times.white_ms, initial - 3_000 - 5_000);
    assert_eq!(times.black_ms, initial - 7_000);

    Ok(())
}

#[tokio::test]
async fn rejected_move_leaves_session_byte_for_byte() -> anyhow::Result<()> {
    let engine = TestEngine::new(&["alice", "bob"]).await;
    let (session_id, white, black) = engine.start("alice", "bob").await;

    engine
        .service
        .make_move(&session_id, &white, &MoveRequest::new("e2", "e4"), START + 1_000)
        .await?;
    let before = engine.sessions.raw(&session_id).await;

    let result = engine
        .service
        .make_move(&session_id, &black, &MoveRequest::new("e8", "e6"), START + 9_000)
        .await;

    assert_eq!(result.unwrap_err().kind(), "invalid_move");
    assert_eq!(engine.sessions.raw(&session_id).await, before);
    assert_eq!(engine.service.get_position(&session_id).await?, {
        let session = engine.sessions.get(&session_id).await?.expect("session");
        session.position
    });

    Ok(())
}

#[tokio::test]
async fn active_match_agrees_with_independent_queries() -> anyhow::Result<()> {
    let engine = TestEngine::new(&["alice", "bob"]).await;
    let (session_id, white, _) = engine.start("alice", "bob").await;

    engine
        .service
        .make_move(&session_id, &white, &MoveRequest::new("g1", "f3"), START + 1_000)
        .await?;

    for offset in [0, EngineConfig::default().initial_clock_ms] {
        engine.clock.set(START + 1_000 + offset);

        let snapshot = engine.service.get_active_match(&white).await?;
        assert_eq!(snapshot.game_over, engine.service.is_over(&session_id).await?);
        assert_eq!(snapshot.winner, engine.service.get_winner(&session_id).await?);
        assert_eq!(snapshot.abandonment_remaining_ms, None);
    }

    Ok(())
}

#[tokio::test]
async fn user_without_match_gets_not_found() {
    let engine = TestEngine::new(&["alice", "bob"]).await;

    let result = engine.service.get_active_match("alice").await;

    assert!(matches!(result, Err(GameSessionServiceError::NotFound(_))));
}

#[tokio::test]
async fn players_can_start_again_after_finalize() -> anyhow::Result<()> {
    let engine = TestEngine::new(&["alice", "bob"]).await;
    let (session_id, white, _) = engine.start("alice", "bob").await;

    engine.service.resign(&session_id, &white).await?;
    let (second_id, _, _) = engine.start("bob", "alice").await;

    assert_ne!(session_id, second_id);
    assert_eq!(
        engine.sessions.get_active_session_id("alice").await?,
        Some(second_id)
    );

    Ok(())
}
