//! Login, logout and accessor behaviour against a scripted backend.

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{Value, json};
use veeam::core::MessageType;
use veeam::transport::{Credentials, HttpResponse, HttpSession, Method, ScriptedSession};
use veeam::{Error, SummaryReport, VeeamClient};

fn login_ok() -> HttpResponse {
    HttpResponse::json(
        201,
        json!({"UserName": "VEEAM\\veeam.api", "SessionId": "2fb28f4f-46bd-4855-a757-0b8c24f9826b"}),
    )
    .with_header("X-RestSvcSessionId", "MMM")
}

fn scripted() -> ScriptedSession {
    let session = ScriptedSession::new();
    session.respond(Method::POST, "/sessionMngr/", login_ok());
    session
}

async fn client(session: ScriptedSession) -> VeeamClient<ScriptedSession> {
    VeeamClient::login(session, Credentials::new("username", "pass"))
        .await
        .unwrap()
}

fn session_run(created: &str, result: &str) -> Value {
    json!({
        "JobUid": "urn:veeam:Job:9be68a1c-7893-4c92-93e9-043be7533759",
        "JobName": "Ven-CC-Basic_750GB",
        "CreationTimeUTC": created,
        "State": "Stopped",
        "Result": result
    })
}

#[tokio::test]
async fn login_sets_session_and_accept_headers() {
    let client = client(scripted()).await;

    assert_eq!(
        client.session().header("X-RestSvcSessionId").as_deref(),
        Some("MMM")
    );
    assert_eq!(
        client.session().header("Accept").as_deref(),
        Some("application/json")
    );
}

#[tokio::test]
async fn non_201_login_is_authentication_failure() {
    let session = ScriptedSession::new();
    session.respond(
        Method::POST,
        "/sessionMngr/",
        HttpResponse::json(401, json!({"Message": "The user name or password is incorrect"})),
    );

    let err = VeeamClient::login(session, Credentials::new("username", "wrong"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::Authentication { status: 401 }));
}

#[tokio::test]
async fn login_200_is_still_authentication_failure() {
    let session = ScriptedSession::new();
    session.respond(Method::POST, "/sessionMngr/", HttpResponse::json(200, json!({})));

    let err = VeeamClient::login(session, Credentials::new("username", "pass"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::Authentication { status: 200 }));
}

#[tokio::test]
async fn created_without_session_header_is_session_key_failure() {
    let session = ScriptedSession::new();
    session.respond(Method::POST, "/sessionMngr/", HttpResponse::json(201, json!({})));

    let err = VeeamClient::login(session, Credentials::new("username", "pass"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::SessionKeyMissing));
}

#[tokio::test]
async fn pass_through_accessors_return_bodies_verbatim() {
    let session = scripted();
    let jobs = json!({"Refs": [{"Name": "Ven-CC-Basic_750GB"}]});
    let job = json!({"Name": "Ven-CC-Basic_750GB", "JobType": "Backup"});
    let backups = json!({"Refs": [{"Name": "[ASS005]:AB_Basic_200GB_1"}]});
    let backup = json!({"Platform": "VMware", "BackupType": "Standard"});
    let restore_points = json!({"Refs": [{"Type": "RestorePointReference"}]});
    let vm_restore_points = json!({"Refs": [{"Type": "VmRestorePointReference"}]});

    session
        .respond(Method::GET, "/jobs", HttpResponse::json(200, jobs.clone()))
        .respond(
            Method::GET,
            "/jobs/9be68a1c-7893-4c92-93e9-043be7533759",
            HttpResponse::json(200, job.clone()),
        )
        .respond(Method::GET, "/backups", HttpResponse::json(200, backups.clone()))
        .respond(
            Method::GET,
            "/backups/f657bc5d-c905-4551-b923-00ab2e7d6fe7",
            HttpResponse::json(200, backup.clone()),
        )
        .respond(
            Method::GET,
            "/backups/f657bc5d-c905-4551-b923-00ab2e7d6fe7/restorePoints",
            HttpResponse::json(200, restore_points.clone()),
        )
        .respond(
            Method::GET,
            "/restorePoints/91db595d-7834-4ba1-aee2-f609e97e046f/vmRestorePoints",
            HttpResponse::json(200, vm_restore_points.clone()),
        );
    let client = client(session).await;

    assert_eq!(client.get_jobs().await.unwrap(), jobs);
    assert_eq!(
        client
            .get_job("9be68a1c-7893-4c92-93e9-043be7533759")
            .await
            .unwrap(),
        job
    );
    assert_eq!(client.get_backups().await.unwrap(), backups);
    assert_eq!(
        client
            .get_backup("f657bc5d-c905-4551-b923-00ab2e7d6fe7")
            .await
            .unwrap(),
        backup
    );
    assert_eq!(
        client
            .get_restore_points("f657bc5d-c905-4551-b923-00ab2e7d6fe7")
            .await
            .unwrap(),
        restore_points
    );
    assert_eq!(
        client
            .get_vm_restore_points("91db595d-7834-4ba1-aee2-f609e97e046f")
            .await
            .unwrap(),
        vm_restore_points
    );

    let entity_requests: Vec<_> = client
        .session()
        .requests()
        .into_iter()
        .filter(|r| r.query_value("format") == Some("Entity"))
        .map(|r| r.path)
        .collect();
    assert_eq!(
        entity_requests,
        vec![
            "/jobs/9be68a1c-7893-4c92-93e9-043be7533759",
            "/backups/f657bc5d-c905-4551-b923-00ab2e7d6fe7"
        ]
    );
}

#[tokio::test]
async fn summaries_hit_their_report_paths() {
    let session = scripted();
    let reports = [
        (SummaryReport::ProcessedVms, json!({"Days": [{"BackupedVms": 67}]})),
        (SummaryReport::JobStatistics, json!({"ScheduledJobs": 82})),
        (SummaryReport::VmsOverview, json!({"ProtectedVms": 400})),
        (SummaryReport::Overview, json!({"BackupServers": 1})),
    ];
    for (report, body) in &reports {
        session.respond(Method::GET, report.path(), HttpResponse::json(200, body.clone()));
    }
    let client = client(session).await;

    assert_eq!(client.get_vms_processed_day().await.unwrap(), reports[0].1);
    assert_eq!(client.get_summary_job_stats().await.unwrap(), reports[1].1);
    assert_eq!(client.get_summary_vms().await.unwrap(), reports[2].1);
    assert_eq!(client.get_summary_overview().await.unwrap(), reports[3].1);
}

#[tokio::test]
async fn missing_id_fails_before_any_request() {
    let client = client(scripted()).await;
    let before = client.session().requests().len();

    assert!(matches!(client.get_backup("").await, Err(Error::InvalidInput(_))));
    assert!(matches!(client.get_job("  ").await, Err(Error::InvalidInput(_))));
    assert!(matches!(
        client.get_restore_points("").await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        client.get_vm_restore_points("").await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        client.get_backup_sessions("").await,
        Err(Error::InvalidInput(_))
    ));

    assert_eq!(client.session().requests().len(), before);
}

#[tokio::test]
async fn not_found_is_a_remote_error() {
    let session = scripted();
    session.respond(
        Method::GET,
        "/jobs/9be68a1c-7893-4c92-93e9-053be7533759",
        HttpResponse::json(
            404,
            json!({
                "FirstChanceExceptionMessage": null,
                "Message": "Cannot find job [9be68a1c-7893-4c92-93e9-045be7533759]",
                "StackTrace": null,
                "Status": null,
                "StatusCode": 404
            }),
        ),
    );
    let client = client(session).await;

    let err = client
        .get_job("9be68a1c-7893-4c92-93e9-053be7533759")
        .await
        .unwrap_err();

    match err {
        Error::Remote {
            status, message, ..
        } => {
            assert_eq!(status, 404);
            assert!(message.starts_with("Cannot find job"));
        }
        other => panic!("expected remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn repositories_get_percentage_tag_and_date() {
    let session = scripted();
    session.respond(
        Method::GET,
        "/reports/summary/repository",
        HttpResponse::json(
            200,
            json!({
                "Periods": [
                    {
                        "Name": "Scale-Out_Backup_Repository_1",
                        "Capacity": 14010040700928u64,
                        "FreeSpace": 5440467521536u64,
                        "BackupSize": 8569573179392u64
                    },
                    {
                        "Name": "TEST_PROXY_NODE1",
                        "Capacity": 372152239390720u64,
                        "FreeSpace": 257601197572096u64,
                        "BackupSize": 114551041818624u64
                    },
                    {
                        "Name": "TEST_JB1_NONGEO_Veeam_09",
                        "Capacity": 9556164866048u64,
                        "FreeSpace": 2106336800768u64,
                        "BackupSize": 7449828065280u64
                    }
                ],
                "CapacityPlanningReportLink": "Workspace/ViewReport.aspx"
            }),
        ),
    );
    let client = client(session).await;
    let generated = NaiveDate::from_ymd_opt(2019, 7, 1)
        .unwrap()
        .and_hms_opt(10, 8, 2)
        .unwrap();

    let repos = client.get_repos_at(generated).await.unwrap();

    let pct: Vec<_> = repos.iter().map(|r| r.percentage_free).collect();
    assert_eq!(pct, vec![Some(38.83), Some(69.22), Some(22.04)]);
    for repo in &repos {
        assert_eq!(repo.message_type, MessageType::Repo);
        assert_eq!(repo.date, "Mon Jul  1 10:08:02 2019");
    }
    assert_eq!(repos[1].period.name, "TEST_PROXY_NODE1");
}

#[tokio::test]
async fn repository_summary_without_periods_is_shape_error() {
    let session = scripted();
    session.respond(
        Method::GET,
        "/reports/summary/repository",
        HttpResponse::json(200, json!({"CapacityPlanningReportLink": "x"})),
    );
    let client = client(session).await;

    let err = client.get_repos().await.unwrap_err();
    assert!(matches!(err, Error::ResponseShape { ref key, .. } if key == "Periods"));
}

#[tokio::test]
async fn last_day_sessions_are_tagged_as_jobs() {
    let session = scripted();
    session.respond_to_query(
        Method::GET,
        "/query",
        "filter",
        r#"creationtime>"2019-06-30T10:08:02Z""#,
        HttpResponse::json(
            200,
            json!({
                "Entities": {"BackupJobSessions": {"BackupJobSessions": [
                    session_run("2019-07-01T09:33:51Z", "Success")
                ]}}
            }),
        ),
    );
    let client = client(session).await;

    let runs = client
        .get_jobs_last_day_at(Utc.with_ymd_and_hms(2019, 7, 1, 10, 8, 2).unwrap())
        .await
        .unwrap();

    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].message_type, Some(MessageType::Job));
}

#[tokio::test]
async fn backup_sessions_are_newest_first() {
    let session = scripted();
    session.respond(
        Method::GET,
        "/jobs/9be68a1c-7893-4c92-93e9-043be7533759/backupSessions",
        HttpResponse::json(
            200,
            json!({"BackupJobSessions": [
                session_run("2019-02-19T20:10:54Z", "Success"),
                session_run("2019-03-04T19:15:22Z", "Success"),
                session_run("2019-02-25T19:15:22Z", "Failed")
            ]}),
        ),
    );
    let client = client(session).await;

    let list = client
        .get_backup_sessions("urn:veeam:Job:9be68a1c-7893-4c92-93e9-043be7533759")
        .await
        .unwrap();

    let out = serde_json::to_value(&list).unwrap();
    assert_eq!(out["BackupJobSessions"].as_array().map(Vec::len), Some(3));

    let created: Vec<_> = list
        .sessions
        .iter()
        .map(|r| r.created_at().format("%Y-%m-%d").to_string())
        .collect();
    assert_eq!(created, vec!["2019-03-04", "2019-02-25", "2019-02-19"]);
}

#[tokio::test]
async fn logout_deletes_the_current_logon_session() {
    let session = scripted();
    session
        .respond(
            Method::GET,
            "/logonSessions",
            HttpResponse::json(
                200,
                json!({"LogonSessions": [{"SessionId": "2fb28f4f-46bd-4855-a757-0b8c24f9826b"}]}),
            ),
        )
        .respond(
            Method::DELETE,
            "/logonSessions/2fb28f4f-46bd-4855-a757-0b8c24f9826b",
            HttpResponse::json(204, Value::Null),
        );
    let client = client(session).await;

    client.logout().await.unwrap();

    let last = client.session().requests().pop().unwrap();
    assert_eq!(last.method, Method::DELETE);
    assert_eq!(last.path, "/logonSessions/2fb28f4f-46bd-4855-a757-0b8c24f9826b");
}

#[tokio::test]
async fn logout_without_sessions_is_shape_error() {
    let session = scripted();
    session.respond(
        Method::GET,
        "/logonSessions",
        HttpResponse::json(200, json!({"LogonSessions": []})),
    );
    let client = client(session).await;

    assert!(matches!(
        client.logout().await,
        Err(Error::ResponseShape { .. })
    ));
}
