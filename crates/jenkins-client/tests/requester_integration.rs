//! HTTP-level behaviour of the requester: crumbs, status mapping,
//! redirects, cancellation and uploads.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use jenkins_client::{ConnectionState, Crumb, CrumbState, Error, ErrorKind};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{any, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{hang_up_server, init_tracing, jenkins, mount_crumb};

#[tokio::test]
async fn test_connect_reads_version_and_root() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Jenkins", "2.440.1")
                .set_body_json(json!({
                    "_class": "hudson.model.Hudson",
                    "mode": "NORMAL",
                    "nodeDescription": "the master Jenkins node",
                    "useCrumbs": true,
                    "jobs": [
                        {"_class": "hudson.model.FreeStyleProject", "name": "demo",
                         "url": "http://localhost/job/demo/", "color": "blue"}
                    ],
                    "views": [{"name": "all", "url": "http://localhost/"}]
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let jenkins = jenkins(&server);
    assert_eq!(jenkins.state(), ConnectionState::Created);
    jenkins.connect(&CancellationToken::new()).await.unwrap();

    assert_eq!(jenkins.state(), ConnectionState::Ready);
    assert_eq!(jenkins.version().as_deref(), Some("2.440.1"));
    let info = jenkins.info();
    assert!(info.use_crumbs);
    assert_eq!(info.jobs[0].name, "demo");
    assert_eq!(info.views[0].name, "all");
}

#[tokio::test]
async fn test_connect_failure_leaves_connection_created() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/json"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let jenkins = jenkins(&server);
    let err = jenkins.connect(&CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.status(), Some(401));
    assert_eq!(jenkins.state(), ConnectionState::Created);
}

#[tokio::test]
async fn test_closed_connection_refuses_requests() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let jenkins = jenkins(&server);
    jenkins.close();
    assert_eq!(jenkins.state(), ConnectionState::Closed);
    let err = jenkins
        .get_job(&CancellationToken::new(), "demo")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Closed));
}

#[tokio::test]
async fn test_crumb_attached_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crumbIssuer/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "crumb": "abc", "crumbRequestField": "Jenkins-Crumb"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/quietDown"))
        .and(header("Jenkins-Crumb", "abc"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let jenkins = jenkins(&server);
    let cancel = CancellationToken::new();
    assert!(jenkins.quiet_down(&cancel).await.unwrap());
    assert!(jenkins.quiet_down(&cancel).await.unwrap());
    assert_eq!(
        jenkins.requester().crumb_state(),
        CrumbState::Fresh(Crumb {
            field: "Jenkins-Crumb".into(),
            value: "abc".into(),
        })
    );
}

#[tokio::test]
async fn test_stale_crumb_is_reacquired_once() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crumbIssuer/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "crumb": "old", "crumbRequestField": "Jenkins-Crumb"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crumbIssuer/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "crumb": "new", "crumbRequestField": "Jenkins-Crumb"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/job/demo/doDelete"))
        .and(header("Jenkins-Crumb", "old"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string("No valid crumb was included in the request"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/job/demo/doDelete"))
        .and(header("Jenkins-Crumb", "new"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let jenkins = jenkins(&server);
    assert!(jenkins
        .delete_job(&CancellationToken::new(), "demo")
        .await
        .unwrap());
    assert!(matches!(
        jenkins.requester().crumb_state(),
        CrumbState::Fresh(crumb) if crumb.value == "new"
    ));
}

#[tokio::test]
async fn test_crumb_rejected_twice_is_authentication_error() {
    let server = MockServer::start().await;
    mount_crumb(&server).await;
    Mock::given(method("POST"))
        .and(path("/quietDown"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string("No valid crumb was included in the request"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let err = jenkins(&server)
        .quiet_down(&CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.status(), Some(403));
}

#[tokio::test]
async fn test_forbidden_without_crumb_complaint_is_authorization() {
    let server = MockServer::start().await;
    mount_crumb(&server).await;
    Mock::given(method("POST"))
        .and(path("/safeRestart"))
        .respond_with(
            ResponseTemplate::new(403).set_body_string("admin is missing the Overall/Administer permission"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = jenkins(&server)
        .safe_restart(&CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[tokio::test]
async fn test_missing_crumb_issuer_posts_without_crumb() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cancelQuietDown"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let jenkins = jenkins(&server);
    assert!(jenkins
        .cancel_quiet_down(&CancellationToken::new())
        .await
        .unwrap());
    assert_eq!(jenkins.requester().crumb_state(), CrumbState::Absent);
}

#[tokio::test]
async fn test_status_mapping() {
    let server = MockServer::start().await;
    mount_crumb(&server).await;
    Mock::given(method("GET"))
        .and(path("/job/broken/api/json"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/createItem"))
        .respond_with(ResponseTemplate::new(409).set_body_string("A job already exists with the name 'demo'"))
        .mount(&server)
        .await;

    let jenkins = jenkins(&server);
    let cancel = CancellationToken::new();

    let err = jenkins.get_job(&cancel, "missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = jenkins.get_job(&cancel, "broken").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.status(), Some(500));
    assert!(err.is_server_error());

    let err = jenkins
        .requester()
        .post_xml(&cancel, "/createItem", "<project/>", &[("name", "demo")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.status(), Some(409));

    let err = jenkins
        .requester()
        .post_form(&cancel, "/job/missing/doDelete", &[], &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_cancelled_token_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let jenkins = jenkins(&server);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = jenkins.get_job(&cancel, "demo").await.unwrap_err();
    assert!(err.is_cancelled());
    let err = jenkins.quiet_down(&cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_cancel_mid_flight() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/job/slow/api/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "slow"}))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let jenkins = jenkins(&server);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = jenkins.get_job(&cancel, "slow").await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_build_trigger_redirect_is_not_followed() {
    init_tracing();
    let server = MockServer::start().await;
    mount_crumb(&server).await;
    Mock::given(method("GET"))
        .and(path("/job/demo/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "demo", "fullName": "demo", "buildable": true, "property": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/job/demo/build"))
        .respond_with(
            ResponseTemplate::new(303)
                .insert_header("Location", format!("{}/queue/item/18/", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(any())
        .and(path("/queue/item/18/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let jenkins = jenkins(&server);
    let cancel = CancellationToken::new();
    let job = jenkins.get_job(&cancel, "demo").await.unwrap();
    assert_eq!(job.invoke_simple(&cancel, &[]).await.unwrap(), 18);
}

#[tokio::test]
async fn test_other_redirects_are_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/job/old/api/json"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/job/new/api/json", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/job/new/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "new"})))
        .expect(1)
        .mount(&server)
        .await;

    let job = jenkins(&server)
        .get_job(&CancellationToken::new(), "old")
        .await
        .unwrap();
    assert_eq!(job.name(), "new");
}

#[tokio::test]
async fn test_multipart_plugin_upload() {
    let server = MockServer::start().await;
    mount_crumb(&server).await;
    Mock::given(method("POST"))
        .and(path("/pluginManager/uploadPlugin"))
        .and(body_string_contains(r#"name="file"; filename="demo.hpi""#))
        .and(body_string_contains("plugin-bytes"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("demo.hpi");
    tokio::fs::write(&file, b"plugin-bytes").await.unwrap();

    assert!(jenkins(&server)
        .upload_plugin(&CancellationToken::new(), &file)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_upload_of_missing_file_is_io_error() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = jenkins(&server)
        .upload_plugin(&CancellationToken::new(), dir.path().join("absent.hpi"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[tokio::test]
async fn test_query_and_tree_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/job/demo/api/json"))
        .and(query_param("tree", "allBuilds[number,url]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "allBuilds": [
                {"number": 3, "url": "http://localhost/job/demo/3/"},
                {"number": 2, "url": "http://localhost/job/demo/2/"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ids = jenkins_client::Job::at(&jenkins(&server), "demo")
        .get_all_build_ids(&CancellationToken::new())
        .await
        .unwrap();
    let numbers: Vec<i64> = ids.iter().map(|b| b.number).collect();
    assert_eq!(numbers, vec![3, 2]);
}

#[tokio::test]
async fn test_get_is_retried_once_after_hang_up() {
    init_tracing();
    let (url, hang_ups) = hang_up_server().await;
    let jenkins = jenkins_client::Jenkins::builder().base_url(url).build().unwrap();

    let err = jenkins
        .requester()
        .get_raw(&CancellationToken::new(), "/api/json", &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(hang_ups.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_post_is_never_retried() {
    let (url, hang_ups) = hang_up_server().await;
    let jenkins = jenkins_client::Jenkins::builder().base_url(url).build().unwrap();

    let err = jenkins.quiet_down(&CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(hang_ups.load(Ordering::SeqCst), 1);
    assert_eq!(jenkins.requester().crumb_state(), CrumbState::Absent);
}
